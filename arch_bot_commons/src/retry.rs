/// Evaluate a Telegram request expression, retrying it a few times if Telegram
/// tells us to slow down or the network hiccups.
///
/// The expression is evaluated again on every attempt, so anything it moves
/// has to be cloned or borrowed inside of it.
///
/// ```ignore
/// let message = teloxide_retry!(bot.send_message(chat_id, &text).await)?;
/// ```
#[macro_export]
macro_rules! teloxide_retry {
    ($request:expr) => {{
        let mut attempts_left: u8 = 3;
        loop {
            match $request {
                Err($crate::__private::teloxide::RequestError::RetryAfter(seconds))
                    if attempts_left > 0 =>
                {
                    attempts_left -= 1;
                    $crate::__private::log::warn!(
                        "Rate limited by Telegram, retrying in {:?}",
                        seconds.duration()
                    );
                    $crate::__private::tokio::time::sleep(seconds.duration()).await;
                }
                Err($crate::__private::teloxide::RequestError::Network(e)) if attempts_left > 0 => {
                    attempts_left -= 1;
                    $crate::__private::log::warn!("Network error, retrying: {}", e);
                    $crate::__private::tokio::time::sleep(std::time::Duration::from_secs(1))
                        .await;
                }
                result => break result,
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use teloxide::{types::Seconds, ApiError, RequestError};

    #[tokio::test]
    async fn retries_until_success() {
        let mut calls = 0;
        let result: Result<u32, RequestError> = crate::teloxide_retry!({
            calls += 1;
            if calls < 3 {
                Err(RequestError::RetryAfter(Seconds::from_seconds(0)))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.ok(), Some(3));
    }

    #[tokio::test]
    async fn gives_up_eventually() {
        let mut calls = 0;
        let result: Result<(), RequestError> = crate::teloxide_retry!({
            calls += 1;
            Err(RequestError::RetryAfter(Seconds::from_seconds(0)))
        });

        assert!(matches!(result, Err(RequestError::RetryAfter(_))));
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), RequestError> = crate::teloxide_retry!({
            calls += 1;
            Err(RequestError::Api(ApiError::MessageNotModified))
        });

        assert!(matches!(
            result,
            Err(RequestError::Api(ApiError::MessageNotModified))
        ));
        assert_eq!(calls, 1);
    }
}
