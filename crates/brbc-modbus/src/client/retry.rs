// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry and backoff for establishing the controller connection.
//!
//! Register transactions are never retried by the client; only the
//! TCP connect step of [`BusController::connect`](super::BusController::connect)
//! uses a [`RetryConfig`].

use std::time::Duration;

use rand::Rng;

use crate::error::{BcError, ExceptionKind};
use crate::types::BusControllerConfig;

// =============================================================================
// RetryConfig
// =============================================================================

/// Connect retry policy.
#[derive(Debug, Clone)]
pub(crate) struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay before each retry.
    pub backoff: ExponentialBackoff,
}

impl RetryConfig {
    /// Connect retry policy of a client configuration.
    ///
    /// Exponential from `retry_delay`, capped at eight times that delay,
    /// with 10% jitter.
    pub fn for_connect(config: &BusControllerConfig) -> Self {
        let initial = config.retry_delay;
        Self {
            max_retries: config.connect_retries,
            backoff: ExponentialBackoff::new(initial, initial.saturating_mul(8)).with_jitter(0.1),
        }
    }

    /// Returns `true` if `attempt` (0-based, already failed) should be retried.
    pub fn should_retry(&self, error: &BcError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match error.kind() {
            ExceptionKind::Timeout => true,
            ExceptionKind::Connection => error.is_retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// ExponentialBackoff
// =============================================================================

/// Exponential backoff with optional jitter.
///
/// Delay doubles with each attempt: initial_delay * 2^attempt.
#[derive(Debug, Clone)]
pub(crate) struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    /// Jitter factor (0.0 = no jitter, 1.0 = up to 100% jitter).
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff without jitter.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            jitter_factor: 0.0,
        }
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Calculates the delay for the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * 2f64.powi(attempt.min(30) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter_factor > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter_factor;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(final_delay)
    }
}

// =============================================================================
// Tests
// =============================================================================
