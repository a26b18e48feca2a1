//! Pick the hash table out of every `<table>` on the page.
//!
//! The page carries unrelated tables (system requirements, for one), so the
//! right one is recognised by its text rather than its position.

use crate::renderer::{ElementRef, Locator, RenderContext};
use anyhow::Result;

/// Decides whether a table's rendered text looks like the one we want.
pub trait TablePolicy: Send + Sync {
    fn accepts(&self, text: &str) -> bool;
}

impl<F> TablePolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accepts(&self, text: &str) -> bool {
        self(text)
    }
}

/// Accepts text containing at least one of `any_of` and every one of `all_of`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPolicy {
    pub any_of: Vec<String>,
    pub all_of: Vec<String>,
}

impl MarkerPolicy {
    /// The hash table: a "Hash Code" or "SHA256" column and English editions.
    pub fn iso_hashes() -> Self {
        Self {
            any_of: vec!["Hash Code".to_string(), "SHA256".to_string()],
            all_of: vec!["English".to_string()],
        }
    }
}

impl Default for MarkerPolicy {
    fn default() -> Self {
        Self::iso_hashes()
    }
}

impl TablePolicy for MarkerPolicy {
    fn accepts(&self, text: &str) -> bool {
        let any = self.any_of.is_empty() || self.any_of.iter().any(|m| text.contains(m.as_str()));
        any && self.all_of.iter().all(|m| text.contains(m.as_str()))
    }
}

/// A `<table>` and its full text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub element: ElementRef,
    pub text: String,
}

/// First table, in document order, that the policy accepts.
///
/// Later matches are ignored even if they would also qualify.
pub fn select_table<'a>(candidates: &'a [Table], policy: &dyn TablePolicy) -> Option<&'a Table> {
    candidates.iter().find(|t| policy.accepts(&t.text))
}

/// Every table in the document with its text. A table without text content
/// is kept with an empty string so document order is preserved.
pub async fn collect_tables(ctx: &mut dyn RenderContext) -> Result<Vec<Table>> {
    let elements = ctx.locate(&Locator::css("table")).await?;
    let mut tables = Vec::with_capacity(elements.len());
    for element in elements {
        let text = ctx.text_of(element).await?.unwrap_or_default();
        tables.push(Table { element, text });
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(i: usize, text: &str) -> Table {
        Table {
            element: ElementRef(i),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_first_qualifying_table_wins() {
        let candidates = vec![
            table(1, "Processor RAM Storage"),
            table(2, "Language SHA256 English (United States)"),
            table(3, "Language Hash Code English International"),
        ];
        let picked = select_table(&candidates, &MarkerPolicy::iso_hashes()).unwrap();
        assert_eq!(picked.element, ElementRef(2));
    }

    #[test]
    fn test_both_marker_groups_required() {
        let policy = MarkerPolicy::iso_hashes();
        assert!(!policy.accepts("Hash Code only"));
        assert!(!policy.accepts("English only"));
        assert!(policy.accepts("Hash Code ... English"));
        assert!(policy.accepts("SHA256 ... English"));
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        let policy = MarkerPolicy::iso_hashes();
        assert!(!policy.accepts("hash code english"));
        assert!(!policy.accepts("sha256 English"));
    }

    #[test]
    fn test_no_candidates() {
        assert!(select_table(&[], &MarkerPolicy::iso_hashes()).is_none());
        let candidates = vec![table(0, "nothing to see")];
        assert!(select_table(&candidates, &MarkerPolicy::iso_hashes()).is_none());
    }

    #[test]
    fn test_closure_policy() {
        let candidates = vec![table(0, "alpha"), table(1, "beta")];
        let policy = |text: &str| text.starts_with('b');
        assert_eq!(select_table(&candidates, &policy).unwrap().element, ElementRef(1));
    }

    #[tokio::test]
    async fn test_collect_tables_from_fixture() {
        let html = include_str!("../../tests/fixtures/download_page.html");
        let mut ctx = crate::renderer::snapshot::SnapshotContext::loaded(html);
        let tables = collect_tables(&mut ctx).await.unwrap();
        assert_eq!(tables.len(), 2);
        assert!(tables[0].text.contains("Processor"));

        let picked = select_table(&tables, &MarkerPolicy::iso_hashes()).unwrap();
        assert_eq!(picked.element, tables[1].element);
    }
}
