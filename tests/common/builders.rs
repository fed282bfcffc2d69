//! Test data builders for creating test objects

use serialscope_rs::config::AppConfig;
use serialscope_rs::engine::{AcquisitionEngine, EngineHandle};
use serialscope_rs::surface::{plot_channel, PlotReceiver};
use serialscope_rs::transport::{share, MockDevice, MockTransport};
use serialscope_rs::types::CaptureMode;

/// Engine wired to a mock device and a plot receiver
pub struct TestRig {
    pub engine: AcquisitionEngine,
    pub handle: EngineHandle,
    pub device: MockDevice,
    pub plot: PlotReceiver,
}

impl TestRig {
    /// y values held by the engine for a channel
    pub fn ys(&self, channel: usize) -> Vec<f64> {
        self.engine
            .store()
            .snapshot(channel)
            .unwrap_or_default()
            .iter()
            .map(|p| p.y)
            .collect()
    }

    /// x values held by the engine for a channel
    pub fn xs(&self, channel: usize) -> Vec<f64> {
        self.engine
            .store()
            .snapshot(channel)
            .unwrap_or_default()
            .iter()
            .map(|p| p.x)
            .collect()
    }
}

/// Builder for creating engines under test
pub struct EngineBuilder {
    config: AppConfig,
    port: Option<String>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            port: Some("mock0".to_string()),
        }
    }

    pub fn mode(mut self, mode: CaptureMode) -> Self {
        self.config.acquisition.mode = mode;
        self
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.config.acquisition.channels = channels;
        self
    }

    pub fn rollover(mut self, rollover: usize) -> Self {
        self.config.acquisition.rollover = rollover;
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.acquisition.tick_interval_ms = ms;
        self
    }

    /// Leave the engine idle instead of opening the mock port
    pub fn unopened(mut self) -> Self {
        self.port = None;
        self
    }

    pub fn build(self) -> TestRig {
        let channels = self.config.acquisition.channels;
        let mock = MockTransport::new(channels);
        let device = mock.device();
        let (feed, plot) = plot_channel(channels, 256, &self.config.display.colors);
        let (engine, handle) = AcquisitionEngine::new(&self.config, share(mock), Box::new(feed));

        if let Some(port) = &self.port {
            handle.select_port(port).unwrap();
        }

        TestRig {
            engine,
            handle,
            device,
            plot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialscope_rs::types::EngineState;

    #[test]
    fn test_engine_builder() {
        let rig = EngineBuilder::new()
            .mode(CaptureMode::Burst)
            .channels(3)
            .rollover(10)
            .build();

        assert_eq!(rig.engine.store().channel_count(), 3);
        assert_eq!(rig.engine.rollover(), 10);
        assert_eq!(rig.handle.state(), EngineState::Burst);

        let rig = EngineBuilder::new().unopened().build();
        assert_eq!(rig.handle.state(), EngineState::Idle);
    }
}
