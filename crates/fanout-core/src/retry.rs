use std::time::Duration;

use crate::types::RetryPolicy;

/// Ceiling on any computed backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Compute the delay before the next attempt of a failed delivery.
///
/// `attempt` is the number of attempts already performed (>= 1 when called
/// after a failure). Returns `None` when no retry should be scheduled: the
/// policy is `None`, or the retry budget (`max_retries`) is spent.
///
/// Stateless on purpose: retry timing is a pure function of the endpoint's
/// policy and the attempt count.
pub fn next_delay(
    policy: RetryPolicy,
    base_delay: Duration,
    max_retries: u32,
    attempt: u32,
) -> Option<Duration> {
    if attempt == 0 {
        return None;
    }
    // attempt 1 is the initial try; retries used so far = attempt - 1
    if attempt - 1 >= max_retries {
        return None;
    }

    let delay = match policy {
        RetryPolicy::None => return None,
        RetryPolicy::Fixed => base_delay,
        RetryPolicy::Linear => base_delay.saturating_mul(attempt),
        RetryPolicy::Exponential => {
            let factor = 2u32.saturating_pow(attempt - 1);
            base_delay.saturating_mul(factor)
        }
    };

    Some(delay.min(MAX_BACKOFF))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_none_policy_never_retries() {
        assert_eq!(next_delay(RetryPolicy::None, SECOND, 5, 1), None);
        assert_eq!(next_delay(RetryPolicy::None, SECOND, 5, 3), None);
    }

    #[test]
    fn test_fixed_policy_constant_interval() {
        assert_eq!(next_delay(RetryPolicy::Fixed, SECOND, 3, 1), Some(SECOND));
        assert_eq!(next_delay(RetryPolicy::Fixed, SECOND, 3, 2), Some(SECOND));
        assert_eq!(next_delay(RetryPolicy::Fixed, SECOND, 3, 3), Some(SECOND));
    }

    #[test]
    fn test_linear_policy_scales_with_attempt() {
        assert_eq!(
            next_delay(RetryPolicy::Linear, SECOND, 5, 1),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            next_delay(RetryPolicy::Linear, SECOND, 5, 2),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            next_delay(RetryPolicy::Linear, SECOND, 5, 3),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_exponential_policy_doubles() {
        // base 1s, max 3 retries: delays after attempts 1..3 are 1s, 2s, 4s
        assert_eq!(
            next_delay(RetryPolicy::Exponential, SECOND, 3, 1),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            next_delay(RetryPolicy::Exponential, SECOND, 3, 2),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            next_delay(RetryPolicy::Exponential, SECOND, 3, 3),
            Some(Duration::from_secs(4))
        );
        assert_eq!(next_delay(RetryPolicy::Exponential, SECOND, 3, 4), None);
    }

    #[test]
    fn test_exponential_delays_non_decreasing_and_capped() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=30 {
            let delay = next_delay(RetryPolicy::Exponential, SECOND, 100, attempt)
                .expect("retry budget not spent");
            assert!(delay >= previous, "backoff must be non-decreasing");
            assert!(delay <= MAX_BACKOFF, "backoff must respect the ceiling");
            previous = delay;
        }
    }

    #[test]
    fn test_budget_exhaustion_stops_scheduling() {
        assert_eq!(next_delay(RetryPolicy::Fixed, SECOND, 0, 1), None);
        assert_eq!(next_delay(RetryPolicy::Linear, SECOND, 2, 3), None);
        assert_eq!(next_delay(RetryPolicy::Exponential, SECOND, 3, 4), None);
        assert!(next_delay(RetryPolicy::Exponential, SECOND, 3, 3).is_some());
    }

    #[test]
    fn test_zero_attempt_is_not_schedulable() {
        assert_eq!(next_delay(RetryPolicy::Fixed, SECOND, 5, 0), None);
    }
}
