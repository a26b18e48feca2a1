//! Expanding the collapsed "Verify your download" panel.
//!
//! The panel is driven as a small state machine. Each step observes the
//! document once (a [`Probe`]) and [`DisclosureState::advance`] decides the
//! next state. There are no retries: a run reaches `Expanded` or
//! `Unavailable` exactly once.

use crate::config::DisclosureConfig;
use crate::renderer::{ElementRef, ElementState, Locator, RenderContext};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Where the verification panel stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureState {
    /// Page loaded, nothing observed yet.
    Unknown,
    /// Trigger present, panel closed.
    Collapsed,
    /// Landmark heading visible.
    Expanded,
    /// Could not confirm the panel is open. Extraction still proceeds.
    Unavailable,
}

/// One observation of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The trigger never attached within the timeout.
    TriggerMissing,
    /// Trigger attached and the landmark is already visible.
    LandmarkVisible,
    /// Trigger attached but the landmark is hidden.
    LandmarkHidden,
    /// After clicking, the landmark became visible.
    Revealed,
    /// After clicking, the landmark stayed hidden.
    RevealTimedOut,
}

impl DisclosureState {
    /// Transition function. Terminal states absorb every probe; a probe that
    /// makes no sense for the current state gives up rather than loop.
    pub fn advance(self, probe: Probe) -> Self {
        use DisclosureState::*;
        match (self, probe) {
            (Expanded, _) => Expanded,
            (Unavailable, _) => Unavailable,
            (Unknown, Probe::TriggerMissing) => Unavailable,
            (Unknown, Probe::LandmarkVisible) => Expanded,
            (Unknown, Probe::LandmarkHidden) => Collapsed,
            (Collapsed, Probe::Revealed) => Expanded,
            (Collapsed, Probe::RevealTimedOut) => Unavailable,
            (Unknown, Probe::Revealed | Probe::RevealTimedOut) => Unavailable,
            (Collapsed, Probe::TriggerMissing | Probe::LandmarkVisible | Probe::LandmarkHidden) => {
                Unavailable
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expanded | Self::Unavailable)
    }
}

impl fmt::Display for DisclosureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Collapsed => "collapsed",
            Self::Expanded => "expanded",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Make sure the hash section is open before tables are read.
///
/// Never fails: timeouts and document errors both end in `Unavailable`,
/// since the table may be present regardless.
pub async fn ensure_expanded(ctx: &mut dyn RenderContext, config: &DisclosureConfig) -> DisclosureState {
    let trigger = Locator::role(&config.trigger_role, &config.trigger_name);
    let landmark = Locator::text(&config.landmark_text);

    let mut state = DisclosureState::Unknown;
    let mut trigger_ref: Option<ElementRef> = None;

    while !state.is_terminal() {
        let probe = match state {
            DisclosureState::Unknown => observe(ctx, &trigger, &landmark, config, &mut trigger_ref).await,
            DisclosureState::Collapsed => match trigger_ref {
                Some(el) => reveal(ctx, el, &landmark, config).await,
                None => Ok(Probe::RevealTimedOut),
            },
            DisclosureState::Expanded | DisclosureState::Unavailable => break,
        };

        let probe = probe.unwrap_or_else(|e| {
            warn!("disclosure check failed: {e:#}");
            Probe::RevealTimedOut
        });
        let next = state.advance(probe);
        debug!(?probe, "disclosure {state} -> {next}");
        state = next;
    }

    match state {
        DisclosureState::Expanded => info!("verification section expanded"),
        _ => info!("verification section unavailable; reading tables as-is"),
    }
    state
}

/// First step: wait for the trigger, then look at the landmark.
async fn observe(
    ctx: &mut dyn RenderContext,
    trigger: &Locator,
    landmark: &Locator,
    config: &DisclosureConfig,
    trigger_ref: &mut Option<ElementRef>,
) -> Result<Probe> {
    let Some(el) = ctx
        .wait_for(trigger, ElementState::Attached, config.attach_timeout)
        .await?
    else {
        return Ok(Probe::TriggerMissing);
    };
    *trigger_ref = Some(el);

    let visible = match ctx.locate(landmark).await?.first() {
        Some(&heading) => ctx.is_visible(heading).await?,
        None => false,
    };
    Ok(if visible {
        Probe::LandmarkVisible
    } else {
        Probe::LandmarkHidden
    })
}

/// Second step: click the trigger and wait for the landmark to show.
async fn reveal(
    ctx: &mut dyn RenderContext,
    trigger: ElementRef,
    landmark: &Locator,
    config: &DisclosureConfig,
) -> Result<Probe> {
    info!("section collapsed, expanding");
    ctx.click(trigger).await?;
    let shown = ctx
        .wait_for(landmark, ElementState::Visible, config.reveal_timeout)
        .await?;
    Ok(if shown.is_some() {
        Probe::Revealed
    } else {
        Probe::RevealTimedOut
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::snapshot::SnapshotContext;
    use crate::renderer::timed::TimedContext;
    use std::time::Duration;

    const COLLAPSED: &str = r#"<html><body>
        <button aria-controls="p">Verify your download</button>
        <div id="p" hidden><h3>Hash values for the ISO files</h3></div>
    </body></html>"#;

    const EXPANDED: &str = r#"<html><body>
        <button aria-controls="p" aria-expanded="true">Verify your download</button>
        <div id="p"><h3>Hash values for the ISO files</h3></div>
    </body></html>"#;

    const NO_TRIGGER: &str = r#"<html><body>
        <h3>Hash values for the ISO files</h3>
    </body></html>"#;

    const BROKEN_TRIGGER: &str = r#"<html><body>
        <button>Verify your download</button>
        <div hidden><h3>Hash values for the ISO files</h3></div>
    </body></html>"#;

    #[test]
    fn test_transitions() {
        use DisclosureState::*;
        assert_eq!(Unknown.advance(Probe::TriggerMissing), Unavailable);
        assert_eq!(Unknown.advance(Probe::LandmarkVisible), Expanded);
        assert_eq!(Unknown.advance(Probe::LandmarkHidden), Collapsed);
        assert_eq!(Collapsed.advance(Probe::Revealed), Expanded);
        assert_eq!(Collapsed.advance(Probe::RevealTimedOut), Unavailable);
        assert_eq!(Expanded.advance(Probe::LandmarkHidden), Expanded);
        assert_eq!(Unavailable.advance(Probe::Revealed), Unavailable);
        assert_eq!(Unknown.advance(Probe::Revealed), Unavailable);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DisclosureState::Expanded.is_terminal());
        assert!(DisclosureState::Unavailable.is_terminal());
        assert!(!DisclosureState::Unknown.is_terminal());
        assert!(!DisclosureState::Collapsed.is_terminal());
    }

    #[tokio::test]
    async fn test_already_expanded_does_not_click() {
        let mut ctx = SnapshotContext::loaded(EXPANDED);
        let state = ensure_expanded(&mut ctx, &DisclosureConfig::default()).await;
        assert_eq!(state, DisclosureState::Expanded);
        assert_eq!(ctx.clicks(), 0);
    }

    #[tokio::test]
    async fn test_collapsed_panel_is_clicked_open() {
        let mut ctx = SnapshotContext::loaded(COLLAPSED);
        let state = ensure_expanded(&mut ctx, &DisclosureConfig::default()).await;
        assert_eq!(state, DisclosureState::Expanded);
        assert_eq!(ctx.clicks(), 1);
    }

    #[tokio::test]
    async fn test_missing_trigger_is_unavailable() {
        let mut ctx = SnapshotContext::loaded(NO_TRIGGER);
        let state = ensure_expanded(&mut ctx, &DisclosureConfig::default()).await;
        assert_eq!(state, DisclosureState::Unavailable);
        assert_eq!(ctx.clicks(), 0);
    }

    #[tokio::test]
    async fn test_click_that_reveals_nothing_is_unavailable() {
        let mut ctx = SnapshotContext::loaded(BROKEN_TRIGGER);
        let state = ensure_expanded(&mut ctx, &DisclosureConfig::default()).await;
        assert_eq!(state, DisclosureState::Unavailable);
        assert_eq!(ctx.clicks(), 1);
    }

    #[tokio::test]
    async fn test_document_error_degrades_to_unavailable() {
        let renderer = crate::renderer::snapshot::SnapshotRenderer::new(COLLAPSED);
        let mut ctx = crate::renderer::Renderer::new_context(&renderer).await.unwrap();
        // Never navigated: every query errors.
        let state = ensure_expanded(ctx.as_mut(), &DisclosureConfig::default()).await;
        assert_eq!(state, DisclosureState::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_never_attaching_waits_out_the_attach_timeout() {
        let config = DisclosureConfig::default();
        let mut ctx = TimedContext::new(None, None);
        let started = tokio::time::Instant::now();

        let state = ensure_expanded(&mut ctx, &config).await;

        assert_eq!(state, DisclosureState::Unavailable);
        assert_eq!(started.elapsed(), config.attach_timeout);
        assert_eq!(ctx.clicks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_trigger_and_slow_reveal_still_expand() {
        let config = DisclosureConfig::default();
        let mut ctx = TimedContext::new(Some(Duration::from_secs(2)), Some(Duration::from_secs(1)));
        let started = tokio::time::Instant::now();

        let state = ensure_expanded(&mut ctx, &config).await;

        assert_eq!(state, DisclosureState::Expanded);
        assert_eq!(ctx.clicks, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_that_never_shows_waits_out_the_reveal_timeout() {
        let config = DisclosureConfig::default();
        let mut ctx = TimedContext::new(Some(Duration::ZERO), None);
        let started = tokio::time::Instant::now();

        let state = ensure_expanded(&mut ctx, &config).await;

        assert_eq!(state, DisclosureState::Unavailable);
        assert_eq!(ctx.clicks, 1);
        assert_eq!(started.elapsed(), config.reveal_timeout);
    }
}
