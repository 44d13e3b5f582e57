// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timing and retry configuration

use std::time::Duration;

use crate::Slave;

/// Delay between two attempts of the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the same time.
    Fixed(Duration),

    /// Double the delay after every failed attempt, up to `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before the attempt that follows the `failed_attempts`-th failure.
    #[must_use]
    pub fn delay(self, failed_attempts: usize) -> Duration {
        match self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial, max } => {
                let shift = failed_attempts.saturating_sub(1).min(16);
                // `shift` is at most 16
                #[allow(clippy::cast_possible_truncation)]
                let factor = 1u32 << shift as u32;
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(100))
    }
}

/// Master configuration.
///
/// Line parameters like baud rate and parity belong to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Slave addressed by requests unless changed through
    /// [`SlaveContext::set_slave`](crate::SlaveContext::set_slave).
    pub slave: Slave,

    /// Maximum time from the end of transmission until the complete
    /// response has been received.
    pub response_timeout: Duration,

    /// Maximum gap between two bytes of the same response.
    pub inter_char_timeout: Duration,

    /// Lower bound for the inter-frame silence of 3.5 character times.
    pub silence_floor: Duration,

    /// Number of transmissions per request, including the first one.
    pub max_attempts: usize,

    /// Delay between attempts.
    pub backoff: Backoff,

    /// Minimum pause after a broadcast before the next transmission.
    pub broadcast_turnaround: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slave: Slave::min_device(),
            response_timeout: Duration::from_secs(1),
            inter_char_timeout: Duration::from_millis(20),
            silence_floor: Duration::from_micros(1750),
            max_attempts: 3,
            backoff: Backoff::default(),
            broadcast_turnaround: Duration::from_millis(100),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_slave(mut self, slave: Slave) -> Self {
        self.slave = slave;
        self
    }

    #[must_use]
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    #[must_use]
    pub fn with_inter_char_timeout(mut self, inter_char_timeout: Duration) -> Self {
        self.inter_char_timeout = inter_char_timeout;
        self
    }

    #[must_use]
    pub fn with_silence_floor(mut self, silence_floor: Duration) -> Self {
        self.silence_floor = silence_floor;
        self
    }

    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_broadcast_turnaround(mut self, broadcast_turnaround: Duration) -> Self {
        self.broadcast_turnaround = broadcast_turnaround;
        self
    }

    /// Minimum bus silence before a frame may be sent at `baud_rate`.
    ///
    /// 3.5 characters of 11 bits each, but never less than
    /// [`Self::silence_floor`].
    #[must_use]
    pub fn inter_frame_delay(&self, baud_rate: u32) -> Duration {
        let bit_times = 35 * 11; // 3.5 characters, scaled by 10
        let micros = 1_000_000 * bit_times / 10 / u64::from(baud_rate.max(1));
        Duration::from_micros(micros).max(self.silence_floor)
    }
}
