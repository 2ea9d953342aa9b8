/*!
 * Everloop LED ring driver.
 *
 * The ring has no data channel and needs no keep-alive. It starts dark and
 * every color change pushes a full image on the config channel.
 */
use std::any::Any;

use async_trait::async_trait;
use tracing::{debug, warn};

use malos_core::error::Result;
use malos_core::types::DriverKind;

use crate::driver::{ConfigPusher, DriverBehavior, DriverContext};
use crate::messages::{DriverConfig, LedValue};

/// Number of LEDs on the MATRIX Creator ring
pub const DEFAULT_LED_COUNT: usize = 35;

/// Spread colors evenly over a ring of `led_count` LEDs
///
/// LED `i` takes color `floor(i * colors.len() / led_count)`, so each color
/// covers a contiguous arc. No colors switches every LED off.
pub fn led_pattern(led_count: usize, colors: &[LedValue]) -> Vec<LedValue> {
    if colors.is_empty() {
        return vec![LedValue::OFF; led_count];
    }
    if colors.len() > led_count {
        warn!(
            "Too many colors for the everloop: {} given for {} LEDs",
            colors.len(),
            led_count
        );
    }

    (0..led_count)
        .map(|led| colors[led * colors.len() / led_count])
        .collect()
}

/// Driver behavior of the LED ring
#[derive(Debug, Clone)]
pub struct EverloopDriver {
    pusher: ConfigPusher,
    led_count: usize,
}

impl EverloopDriver {
    /// Create a driver for a ring of the default size
    pub fn new(ctx: DriverContext) -> Self {
        Self::with_led_count(ctx, DEFAULT_LED_COUNT)
    }

    /// Create a driver for a ring of `led_count` LEDs
    pub fn with_led_count(ctx: DriverContext, led_count: usize) -> Self {
        Self {
            pusher: ctx.pusher,
            led_count,
        }
    }

    /// Number of LEDs on the ring
    pub fn led_count(&self) -> usize {
        self.led_count
    }

    /// Light every LED white with the given intensity
    pub async fn set_uniform_intensity(&self, white: u32) -> Result<()> {
        self.set_uniform_color(0, 0, 0, white).await
    }

    /// Light every LED with the same color
    pub async fn set_uniform_color(&self, red: u32, green: u32, blue: u32, white: u32) -> Result<()> {
        self.set_colors(&[LedValue::new(red, green, blue, white)]).await
    }

    /// Spread colors over the ring
    pub async fn set_colors(&self, colors: &[LedValue]) -> Result<()> {
        debug!("Showing {} colors on {} LEDs", colors.len(), self.led_count);
        let image = led_pattern(self.led_count, colors);
        self.pusher.push(&DriverConfig::image(image)).await
    }
}

#[async_trait]
impl DriverBehavior for EverloopDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Everloop
    }

    fn initial_configuration(&self) -> DriverConfig {
        DriverConfig::image(led_pattern(self.led_count, &[]))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use malos_core::config::TimingConfig;
    use malos_core::types::{DriverAddress, DriverDescriptor, Endpoint};

    use super::*;
    use crate::codec::{JsonCodec, MessageCodec};
    use crate::transport::Transport;
    use crate::transports::MemoryTransport;

    const RED: LedValue = LedValue::new(255, 0, 0, 0);
    const BLUE: LedValue = LedValue::new(0, 0, 255, 0);

    #[test]
    fn test_pattern_covers_contiguous_arcs() {
        let pattern = led_pattern(4, &[RED, BLUE]);
        assert_eq!(pattern, vec![RED, RED, BLUE, BLUE]);

        let pattern = led_pattern(35, &[RED, BLUE]);
        assert_eq!(pattern.iter().filter(|led| **led == RED).count(), 18);
        assert_eq!(pattern[34], BLUE);
    }

    #[test]
    fn test_pattern_edge_cases() {
        assert_eq!(led_pattern(3, &[]), vec![LedValue::OFF; 3]);
        assert_eq!(led_pattern(2, &[RED, BLUE, RED, BLUE]), vec![RED, RED]);
        assert!(led_pattern(0, &[RED]).is_empty());
    }

    #[tokio::test]
    async fn test_uniform_color_pushes_full_image() {
        let transport = MemoryTransport::new();
        let endpoint = Endpoint::tcp("127.0.0.1", 20021);
        let channel = transport.connect_push(&endpoint).await.unwrap();
        let driver = EverloopDriver::new(DriverContext {
            descriptor: DriverDescriptor::new("everloop", DriverAddress::new("127.0.0.1", 20021)),
            pusher: ConfigPusher::new(endpoint.clone(), JsonCodec::shared(), channel),
            codec: JsonCodec::shared(),
            timing: TimingConfig::default(),
            shutdown: CancellationToken::new(),
        });

        assert!(!driver.needs_keep_alive());
        assert!(!driver.has_data_handler());
        assert_eq!(
            driver.initial_configuration().image.unwrap().led,
            vec![LedValue::OFF; DEFAULT_LED_COUNT]
        );

        driver.set_uniform_intensity(40).await.unwrap();
        let sent = transport.sent(&endpoint);
        let image = JsonCodec.decode_config(&sent[0]).unwrap().image.unwrap();
        assert_eq!(image.led.len(), 35);
        assert!(image.led.iter().all(|led| *led == LedValue::new(0, 0, 0, 40)));
    }
}
