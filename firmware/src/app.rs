use alloc::{format, string::String};
use core::fmt;

use shared::schema::{CompanionMessage, DeviceMessage, decode_device_message};
use shared::tokens::TokenStore;
use shared::totp::ClockDrift;

use crate::drift::ClockDriftTracker;
use crate::ui::{
    ClockSyncBanner, INVISIBLE_UPDATE_MARGIN, RefreshReport, RenderError, StatusSurface,
    TileRenderEngine, VirtualListHost, VisibleWindow,
};

/// Errors produced while applying companion messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Payload from the companion could not be decoded.
    Decode(String),
    Render(RenderError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Decode(err) => write!(f, "failed to decode companion message: {err}"),
            AppError::Render(err) => write!(f, "render failed: {err}"),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(value: RenderError) -> Self {
        AppError::Render(value)
    }
}

/// Wearable-side runtime: the received token list, clock drift, tile pool, and banner.
///
/// Created once at startup and driven by companion messages, paint opportunities, and the
/// periodic tick.
pub struct DeviceApp<H> {
    host: H,
    store: TokenStore,
    drift: ClockDriftTracker,
    engine: TileRenderEngine,
    banner: ClockSyncBanner,
    margin: usize,
}

impl<H> DeviceApp<H>
where
    H: VirtualListHost + StatusSurface,
{
    pub fn new(host: H, pool_size: usize) -> Self {
        Self {
            host,
            store: TokenStore::new(),
            drift: ClockDriftTracker::new(),
            engine: TileRenderEngine::new(pool_size),
            banner: ClockSyncBanner::new(),
            margin: INVISIBLE_UPDATE_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn drift(&self) -> ClockDrift {
        self.drift.drift()
    }

    pub fn engine(&self) -> &TileRenderEngine {
        &self.engine
    }

    pub fn banner(&self) -> &ClockSyncBanner {
        &self.banner
    }

    /// Decode and apply a raw companion payload.
    pub fn handle_payload(&mut self, payload: &[u8], now_ms: u64) -> Result<(), AppError> {
        let message =
            decode_device_message(payload).map_err(|err| AppError::Decode(format!("{err}")))?;
        self.handle_message(message, now_ms)
    }

    pub fn handle_message(&mut self, message: DeviceMessage, now_ms: u64) -> Result<(), AppError> {
        match message {
            DeviceMessage::Tokens(snapshot) => {
                self.store = TokenStore::from_snapshot(snapshot);
                log::info!("received {} tokens", self.store.len());
                self.engine.initialize(&mut self.host, self.store.len());
                Ok(())
            }
            DeviceMessage::ClockDrift { drift_ms } => {
                let drift = ClockDrift::from_millis(drift_ms);
                if self.drift.set_drift(drift) && drift != ClockDrift::ZERO {
                    self.banner.show(&mut self.host);
                }
                log::info!("clock drift set to {drift_ms} ms");
                self.update_token_list(now_ms)?;
                Ok(())
            }
        }
    }

    /// Message asking the companion to measure drift against this clock.
    pub fn report_time(&self, now_ms: u64) -> CompanionMessage {
        CompanionMessage::DeviceTime { now_ms }
    }

    /// Paint opportunity: runs the redraw deferred by the last list initialization.
    pub fn on_animation_frame(&mut self) -> bool {
        self.engine.on_animation_frame(&mut self.host)
    }

    /// Periodic refresh: advances the banner timer and recomputes the visible tiles.
    pub fn tick(&mut self, elapsed_ms: u32, now_ms: u64) -> Result<RefreshReport, AppError> {
        self.banner.tick(&mut self.host, elapsed_ms);
        Ok(self.update_token_list(now_ms)?)
    }

    /// Refresh the visible tiles, re-initializing the pool first if the list length changed.
    pub fn update_token_list(&mut self, now_ms: u64) -> Result<RefreshReport, RenderError> {
        let length = self.store.len();
        if self.engine.length() != length || self.host.length() != length {
            self.engine.initialize(&mut self.host, length);
        }
        let window = VisibleWindow::from_host(&self.host);
        self.engine.refresh_visible(
            &mut self.host,
            &self.store,
            &self.drift,
            now_ms,
            window,
            self.margin,
        )
    }
}
