use std::time::Duration;

/// Retry `connect` until it succeeds or `attempts` run out.
///
/// Children race the master for the shared segments at startup: the
/// segments exist before any child is spawned, but a slow filesystem or a
/// pid not yet recorded can make the first attach attempt fail. Bounded
/// retries keep a child from spinning forever against a master that died
/// during setup.
pub fn wait_for_resource<F, T, E>(
    mut connect: F,
    attempts: u32,
    poll_interval: Duration,
    resource_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut tries = 0;
    loop {
        match connect() {
            Ok(resource) => {
                tracing::debug!("{} connected", resource_name);
                return Ok(resource);
            }
            Err(e) => {
                tries += 1;
                if tries >= attempts {
                    tracing::error!("{} unavailable after {} attempts: {}", resource_name, tries, e);
                    return Err(e);
                }
                tracing::debug!("waiting for {} ({})", resource_name, e);
                std::thread::sleep(poll_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_on_first_success() {
        let result: Result<u32, String> =
            wait_for_resource(|| Ok(7), 3, Duration::from_millis(1), "thing");
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result: Result<u32, String> = wait_for_resource(
            || {
                calls += 1;
                if calls < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(calls)
                }
            },
            10,
            Duration::from_millis(1),
            "thing",
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_the_attempt_limit() {
        let mut calls = 0;
        let result: Result<u32, String> = wait_for_resource(
            || {
                calls += 1;
                Err("never".to_string())
            },
            4,
            Duration::from_millis(1),
            "thing",
        );
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }
}
