//! Request preprocessor chain
//!
//! Preprocessors are the transformers/validators that run before
//! negotiation and binding. Class-level preprocessors run first, then
//! method-level ones, each in declaration order, and the chain is strictly
//! sequential: a preprocessor's future is awaited to completion before the
//! next one starts, so later preprocessors can rely on fields attached by
//! earlier ones. The first error aborts the chain and propagates to the
//! dispatcher's error path.
//!
//! # Example
//!
//! ```rust,ignore
//! use restkit_core::{preprocessor_fn, ApiError};
//!
//! let validate = preprocessor_fn(|req| {
//!     if req.json().and_then(|b| b.get("valid")).is_none() {
//!         return Err(ApiError::bad_request("missing valid flag"));
//!     }
//!     Ok(())
//! });
//! ```

use crate::error::Result;
use crate::request::Request;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// A request transformer/validator run before negotiation and binding.
///
/// Implementations may mutate the request (attach derived attributes, set
/// the principal) or reject it by returning a typed client error.
pub trait Preprocessor: Send + Sync + 'static {
    /// Process the request, possibly suspending.
    fn process<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<()>>;
}

struct SyncPreprocessor<F>(F);

impl<F> Preprocessor for SyncPreprocessor<F>
where
    F: Fn(&mut Request) -> Result<()> + Send + Sync + 'static,
{
    fn process<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<()>> {
        let result = (self.0)(request);
        Box::pin(async move { result })
    }
}

struct AsyncPreprocessor<F>(F);

impl<F> Preprocessor for AsyncPreprocessor<F>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn process<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<()>> {
        (self.0)(request)
    }
}

/// Wrap a synchronous closure as a [`Preprocessor`].
pub fn preprocessor_fn<F>(f: F) -> Arc<dyn Preprocessor>
where
    F: Fn(&mut Request) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncPreprocessor(f))
}

/// Wrap a future-returning closure as a [`Preprocessor`].
///
/// Synchronous and asynchronous preprocessors are indistinguishable to the
/// chain runner; both are awaited through the same suspension point.
pub fn async_preprocessor_fn<F>(f: F) -> Arc<dyn Preprocessor>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(AsyncPreprocessor(f))
}

/// Run a preprocessor chain to completion, in order.
pub async fn run(chain: &[Arc<dyn Preprocessor>], request: &mut Request) -> Result<()> {
    for preprocessor in chain {
        preprocessor.process(request).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use bytes::Bytes;
    use http::Method;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn test_request() -> Request {
        Request::new(
            Method::POST,
            "/test".parse().unwrap(),
            http::HeaderMap::new(),
            Bytes::new(),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut chain: Vec<Arc<dyn Preprocessor>> = Vec::new();
        for i in 0..4usize {
            let order = order.clone();
            chain.push(preprocessor_fn(move |_req| {
                order.lock().unwrap().push(i);
                Ok(())
            }));
        }

        let mut req = test_request();
        run(&chain, &mut req).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_short_circuits() {
        let ran_after = Arc::new(Mutex::new(false));
        let flag = ran_after.clone();

        let chain: Vec<Arc<dyn Preprocessor>> = vec![
            preprocessor_fn(|_req| Err(ApiError::bad_request("rejected"))),
            preprocessor_fn(move |_req| {
                *flag.lock().unwrap() = true;
                Ok(())
            }),
        ];

        let mut req = test_request();
        let err = run(&chain, &mut req).await.unwrap_err();
        assert_eq!(err.status, http::StatusCode::BAD_REQUEST);
        assert!(!*ran_after.lock().unwrap());
    }

    #[tokio::test]
    async fn test_async_sees_sync_mutation() {
        let chain: Vec<Arc<dyn Preprocessor>> = vec![
            preprocessor_fn(|req| {
                req.set_attribute("flag_a", true);
                Ok(())
            }),
            async_preprocessor_fn(|req| {
                Box::pin(async move {
                    if req.attribute("flag_a").and_then(|v| v.as_bool()) == Some(true) {
                        req.set_attribute("flag_b", true);
                    }
                    Ok(())
                })
            }),
        ];

        let mut req = test_request();
        run(&chain, &mut req).await.unwrap();
        assert_eq!(req.attribute("flag_b").and_then(|v| v.as_bool()), Some(true));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// For any failing position k, preprocessors after k never execute
        /// and the chain reports k's error.
        #[test]
        fn prop_chain_stops_at_first_failure(
            len in 1usize..8,
            fail_at in 0usize..8,
        ) {
            prop_assume!(fail_at < len);

            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let executed = Arc::new(Mutex::new(Vec::new()));
                let mut chain: Vec<Arc<dyn Preprocessor>> = Vec::new();
                for i in 0..len {
                    let executed = executed.clone();
                    chain.push(preprocessor_fn(move |_req| {
                        executed.lock().unwrap().push(i);
                        if i == fail_at {
                            Err(ApiError::bad_request(format!("failed at {}", i)))
                        } else {
                            Ok(())
                        }
                    }));
                }

                let mut req = test_request();
                let result = run(&chain, &mut req).await;
                prop_assert!(result.is_err());
                let executed = executed.lock().unwrap();
                prop_assert_eq!(executed.len(), fail_at + 1);
                prop_assert_eq!(*executed.last().unwrap(), fail_at);
                Ok(())
            })?;
        }
    }
}
