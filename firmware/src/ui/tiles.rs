use alloc::{boxed::Box, string::String, vec};
use core::fmt;
use core::ops::RangeInclusive;

use shared::tokens::{TokenId, TotpConfig};
use shared::totp::{self, PLACEHOLDER_CODE};

use super::data::TokenSource;
use super::host::{VirtualListHost, VisibleWindow};
use super::render::{ProgressArc, TileView};
use crate::drift::ClockDriftTracker;

/// Tiles refreshed beyond each edge of the visible window to hide pop-in while scrolling.
pub const INVISIBLE_UPDATE_MARGIN: usize = 3;

/// Number of physical tiles provisioned when no explicit size is requested.
pub const DEFAULT_TILE_POOL_SIZE: usize = 16;

/// Logical item currently shown by a pooled slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileBinding {
    pub index: usize,
    pub token: Option<TokenId>,
}

/// Errors raised by [`TileRenderEngine::refresh_visible`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The list length changed since the last [`TileRenderEngine::initialize`].
    StaleWindow { expected: usize, found: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::StaleWindow { expected, found } => write!(
                f,
                "list length {found} does not match initialized length {expected}"
            ),
        }
    }
}

/// Outcome of a single refresh pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Logical indices that were configured, if any.
    pub range: Option<RangeInclusive<usize>>,
    /// Slots whose binding changed to a different index or token.
    pub rebound: usize,
    /// Slots whose content was recomputed.
    pub refreshed: usize,
    /// Slots rendered with the placeholder code.
    pub placeholders: usize,
}

/// Maps the visible part of the token list onto a fixed pool of reusable tiles.
///
/// Logical index `i` lives in slot `i % pool_size`. The pool is allocated once and never
/// resized; every refresh rewrites the bound slots and finishes with one explicit redraw.
pub struct TileRenderEngine {
    slots: Box<[Option<TileBinding>]>,
    length: usize,
    redraw_scheduled: bool,
}

impl TileRenderEngine {
    pub fn new(pool_size: usize) -> Self {
        Self {
            slots: vec![None; pool_size.max(1)].into_boxed_slice(),
            length: 0,
            redraw_scheduled: false,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.slots.len()
    }

    /// Length recorded by the last [`TileRenderEngine::initialize`].
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn binding(&self, slot: usize) -> Option<&TileBinding> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn bound_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().flatten().map(|binding| binding.index)
    }

    pub fn redraw_scheduled(&self) -> bool {
        self.redraw_scheduled
    }

    /// Drop every binding, publish the new length, and schedule one deferred redraw.
    pub fn initialize<H>(&mut self, host: &mut H, total_length: usize)
    where
        H: VirtualListHost + ?Sized,
    {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.length = total_length;
        host.set_length(total_length);
        self.redraw_scheduled = true;
        log::debug!("tile pool initialized for {total_length} tokens");
    }

    /// Run the deferred redraw, if one is pending. Call at each paint opportunity.
    pub fn on_animation_frame<H>(&mut self, host: &mut H) -> bool
    where
        H: VirtualListHost + ?Sized,
    {
        if !self.redraw_scheduled {
            return false;
        }
        self.redraw_scheduled = false;
        host.redraw();
        true
    }

    /// Rebind and recompute every tile in the visible window widened by `margin`.
    ///
    /// Content is recomputed even when a slot keeps its binding, since progress is time
    /// dependent. Fails without touching the pool when the window or the source disagree with
    /// the initialized length.
    pub fn refresh_visible<H, S>(
        &mut self,
        host: &mut H,
        source: &S,
        clock: &ClockDriftTracker,
        now_ms: u64,
        window: VisibleWindow,
        margin: usize,
    ) -> Result<RefreshReport, RenderError>
    where
        H: VirtualListHost + ?Sized,
        S: TokenSource + ?Sized,
    {
        for found in [window.total_length, source.len()] {
            if found != self.length {
                log::error!("refusing refresh: length {found}, initialized {}", self.length);
                return Err(RenderError::StaleWindow {
                    expected: self.length,
                    found,
                });
            }
        }

        let Some(range) = window.with_margin(margin) else {
            host.set_list_visible(false);
            host.redraw();
            return Ok(RefreshReport::default());
        };
        let range = self.fit_to_pool(&window, range);

        let mut report = RefreshReport {
            range: Some(range.clone()),
            ..RefreshReport::default()
        };
        for index in range {
            let slot = index % self.slots.len();
            let binding = TileBinding {
                index,
                token: source.token_id(index),
            };
            if self.slots[slot].as_ref() != Some(&binding) {
                report.rebound += 1;
                self.slots[slot] = Some(binding);
            }

            let view = match source.token(index) {
                Some(token) => {
                    let name = source
                        .display_name(index)
                        .unwrap_or_else(|| token.default_display_name());
                    render_tile(index, token, name, clock, now_ms)
                }
                None => placeholder_tile(index, String::new()),
            };
            if view.placeholder {
                report.placeholders += 1;
            }
            host.configure_tile(slot, &view);
            report.refreshed += 1;
        }

        host.set_list_visible(true);
        host.redraw();
        Ok(report)
    }

    /// Shrink `range` to the pool size, keeping the visible window and splitting the rest of the
    /// budget between both margins.
    fn fit_to_pool(
        &self,
        window: &VisibleWindow,
        range: RangeInclusive<usize>,
    ) -> RangeInclusive<usize> {
        let pool = self.slots.len();
        let (start, end) = range.into_inner();
        if end - start < pool {
            return start..=end;
        }

        let visible = window.last - window.first + 1;
        if visible >= pool {
            log::debug!("visible window larger than tile pool ({visible} > {pool})");
            return window.first..=window.first + pool - 1;
        }

        let budget = pool - visible;
        let before_available = window.first - start;
        let after_available = end - window.last;
        let before_share = before_available.min(budget.div_ceil(2));
        let after = after_available.min(budget - before_share);
        // Budget the trailing margin left unused goes back to the leading one.
        let before = before_available.min(budget - after);
        (window.first - before)..=(window.last + after)
    }
}

fn render_tile(
    index: usize,
    token: &TotpConfig,
    display_name: String,
    clock: &ClockDriftTracker,
    now_ms: u64,
) -> TileView {
    let drift = clock.drift();
    match totp::compute_code(token, now_ms, drift) {
        Ok(code) => TileView {
            index,
            code: totp::format_code(&code),
            display_name,
            progress: ProgressArc::from_progress(totp::period_progress(
                token.period,
                now_ms,
                drift,
            )),
            placeholder: false,
        },
        Err(err) => {
            log::warn!("tile {index} renders placeholder: {err}");
            placeholder_tile(index, display_name)
        }
    }
}

fn placeholder_tile(index: usize, display_name: String) -> TileView {
    TileView {
        index,
        code: String::from(PLACEHOLDER_CODE),
        display_name,
        progress: ProgressArc::default(),
        placeholder: true,
    }
}
