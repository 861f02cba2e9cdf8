//! The recognized configuration surface (spec §3 "MediaOptions /
//! ContainerConfiguration" and spec §6 "Configuration").

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options recognized by the core when opening or changing media.
///
/// Follows the teacher's layered-config convention of a fully-defaulted,
/// serde-backed settings struct (`termusiclib::config`), loadable from TOML
/// via [`ContainerConfiguration::from_toml_str`] or built programmatically
/// with [`ContainerConfiguration::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfiguration {
    pub subtitles_url: Option<String>,
    pub subtitles_delay: Duration,
    pub is_subtitle_disabled: bool,
    pub is_time_sync_disabled: bool,
    pub use_parallel_rendering: bool,
    pub is_fluid_seeking_disabled: bool,
    minimum_playback_buffer_percent: f64,
    pub protocol_prefix: Option<String>,
    pub forced_input_format: Option<String>,
}

impl Default for ContainerConfiguration {
    fn default() -> Self {
        Self {
            subtitles_url: None,
            subtitles_delay: Duration::ZERO,
            is_subtitle_disabled: false,
            is_time_sync_disabled: false,
            use_parallel_rendering: false,
            is_fluid_seeking_disabled: false,
            minimum_playback_buffer_percent: 0.0,
            protocol_prefix: None,
            forced_input_format: None,
        }
    }
}

impl ContainerConfiguration {
    #[must_use]
    pub fn builder() -> ContainerConfigurationBuilder {
        ContainerConfigurationBuilder(Self::default())
    }

    /// Loads configuration from a TOML document, falling back to defaults
    /// for any field the document omits.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not valid TOML for this shape.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: Self = toml::from_str(s)?;
        cfg.minimum_playback_buffer_percent = cfg.minimum_playback_buffer_percent.clamp(0.0, 1.0);
        Ok(cfg)
    }

    /// `minimum_playback_buffer_percent`, always in `[0.0, 1.0]` regardless
    /// of what was passed at construction time (spec §6: "clamped to
    /// `[0, 1]`").
    #[must_use]
    pub fn minimum_playback_buffer_percent(&self) -> f64 {
        self.minimum_playback_buffer_percent
    }
}

/// Builder that clamps `minimum_playback_buffer_percent` on `build()`,
/// mirroring the validation `ContainerConfiguration::from_toml_str` applies
/// implicitly via [`ContainerConfiguration::minimum_playback_buffer_percent`].
pub struct ContainerConfigurationBuilder(ContainerConfiguration);

impl ContainerConfigurationBuilder {
    #[must_use]
    pub fn subtitles_url(mut self, url: impl Into<String>) -> Self {
        self.0.subtitles_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn subtitles_delay(mut self, delay: Duration) -> Self {
        self.0.subtitles_delay = delay;
        self
    }

    #[must_use]
    pub fn is_subtitle_disabled(mut self, v: bool) -> Self {
        self.0.is_subtitle_disabled = v;
        self
    }

    #[must_use]
    pub fn is_time_sync_disabled(mut self, v: bool) -> Self {
        self.0.is_time_sync_disabled = v;
        self
    }

    #[must_use]
    pub fn use_parallel_rendering(mut self, v: bool) -> Self {
        self.0.use_parallel_rendering = v;
        self
    }

    #[must_use]
    pub fn is_fluid_seeking_disabled(mut self, v: bool) -> Self {
        self.0.is_fluid_seeking_disabled = v;
        self
    }

    #[must_use]
    pub fn minimum_playback_buffer_percent(mut self, v: f64) -> Self {
        self.0.minimum_playback_buffer_percent = v.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn protocol_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.0.protocol_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn forced_input_format(mut self, format: impl Into<String>) -> Self {
        self.0.forced_input_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ContainerConfiguration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_has_zero_buffer_floor() {
        let cfg = ContainerConfiguration::default();
        assert_eq!(cfg.minimum_playback_buffer_percent(), 0.0);
    }

    #[test]
    fn builder_clamps_buffer_percent() {
        let cfg = ContainerConfiguration::builder()
            .minimum_playback_buffer_percent(1.5)
            .build();
        assert_eq!(cfg.minimum_playback_buffer_percent(), 1.0);

        let cfg = ContainerConfiguration::builder()
            .minimum_playback_buffer_percent(-0.5)
            .build();
        assert_eq!(cfg.minimum_playback_buffer_percent(), 0.0);
    }

    #[test]
    fn toml_roundtrip_uses_defaults_for_missing_fields() {
        let cfg = ContainerConfiguration::from_toml_str("is_time_sync_disabled = true").unwrap();
        assert!(cfg.is_time_sync_disabled);
        assert!(!cfg.use_parallel_rendering);
    }

    #[test]
    fn toml_load_clamps_out_of_range_buffer_percent() {
        let cfg = ContainerConfiguration::from_toml_str("minimum_playback_buffer_percent = 3.0").unwrap();
        assert_eq!(cfg.minimum_playback_buffer_percent(), 1.0);
    }
}
