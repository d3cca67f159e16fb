//! Request dispatcher
//!
//! One [`CompiledMethod`] per route, produced by the route builder. Each
//! request runs the fixed pipeline: preprocess → authorize → negotiate →
//! bind → invoke → serialize, with any stage failure mapped to a response
//! exactly once at this boundary. A failed request is terminal; nothing is
//! retried.

use crate::binder;
use crate::error::Result;
use crate::factory::ServiceFactory;
use crate::guard;
use crate::metadata::{MethodCallback, ParamDescriptor, ServiceConstructor, ServiceId};
use crate::preprocessor::{self, Preprocessor};
use crate::request::Request;
use crate::response::{render_value, IntoResponse, Response, ResponseSink};
use std::sync::Arc;
use tracing::{debug, error};

// Stage progression per request:
// Idle → Preprocessing → Authorizing → Binding → Invoking → Serializing →
// Responded, with Failed reachable from every non-terminal stage.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Preprocessing,
    Authorizing,
    Binding,
    Invoking,
    Serializing,
}

/// A service method compiled into an executable route target: effective
/// (inheritance-resolved, class+method merged) metadata plus the
/// collaborators needed at request time.
pub(crate) struct CompiledMethod {
    pub service: ServiceId,
    pub method: String,
    pub roles: Vec<String>,
    pub languages: Vec<String>,
    pub accepts: Vec<String>,
    pub preprocessors: Vec<Arc<dyn Preprocessor>>,
    pub parameters: Vec<ParamDescriptor>,
    pub raw_response: bool,
    pub callback: MethodCallback,
    pub constructor: Option<ServiceConstructor>,
    pub factory: Arc<dyn ServiceFactory>,
}

impl CompiledMethod {
    /// Run the pipeline, funneling any stage failure into a mapped error
    /// response.
    pub(crate) async fn handle(&self, mut request: Request) -> Response {
        match self.run(&mut request).await {
            Ok(response) => response,
            Err(err) => {
                if err.status.is_server_error() {
                    error!(
                        service = self.service.name(),
                        method = %self.method,
                        error = %err,
                        internal = err.internal.as_deref().unwrap_or(""),
                        "request pipeline failed"
                    );
                } else {
                    debug!(
                        service = self.service.name(),
                        method = %self.method,
                        error = %err,
                        "request rejected"
                    );
                }
                err.into_response()
            }
        }
    }

    async fn run(&self, request: &mut Request) -> Result<Response> {
        self.trace(Stage::Preprocessing);
        preprocessor::run(&self.preprocessors, request).await?;

        self.trace(Stage::Authorizing);
        guard::authorize(&self.roles, request)?;
        if let Some(tag) = guard::negotiate_language(&self.languages, request)? {
            request.set_language(tag);
        }
        guard::negotiate_content_type(&self.accepts, request)?;

        self.trace(Stage::Binding);
        let sink = ResponseSink::new();
        let args = binder::bind(&self.parameters, request, &sink, &self.factory)?;
        let instance = self.factory.resolve(self.service, self.constructor.as_ref())?;

        self.trace(Stage::Invoking);
        let value = (self.callback)(instance, args).await?;

        self.trace(Stage::Serializing);
        if self.raw_response {
            // The method wrote through the sink itself; its return value is
            // not serialized.
            Ok(sink.into_response())
        } else {
            Ok(render_value(value))
        }
    }

    fn trace(&self, stage: Stage) {
        debug!(
            service = self.service.name(),
            method = %self.method,
            stage = ?stage,
            "pipeline stage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::factory::DefaultServiceFactory;
    use crate::metadata::{
        method_callback, service_constructor, ParamDescriptor, ParamKind,
    };
    use crate::preprocessor::preprocessor_fn;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct EchoService;

    fn compiled(callback: MethodCallback) -> CompiledMethod {
        CompiledMethod {
            service: ServiceId::of::<EchoService>(),
            method: "test".to_string(),
            roles: Vec::new(),
            languages: Vec::new(),
            accepts: Vec::new(),
            preprocessors: Vec::new(),
            parameters: Vec::new(),
            raw_response: false,
            callback,
            constructor: Some(service_constructor(|| EchoService)),
            factory: Arc::new(DefaultServiceFactory),
        }
    }

    fn request() -> Request {
        Request::new(
            Method::GET,
            "/test".parse().unwrap(),
            http::HeaderMap::new(),
            Bytes::new(),
            HashMap::new(),
        )
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_success_serializes_return_value() {
        let method = compiled(method_callback(|_instance, _args| async move {
            Ok(json!({"ok": true}))
        }));

        let response = method.handle(request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_preprocessor_failure_skips_invocation() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();

        let mut method = compiled(method_callback(move |_instance, _args| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(serde_json::Value::Null)
            }
        }));
        method.preprocessors = vec![preprocessor_fn(|_req| {
            Err(ApiError::bad_request("rejected"))
        })];

        let response = method.handle(request()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_auth_failure_before_binding() {
        let mut method = compiled(method_callback(|_instance, _args| async move {
            Ok(serde_json::Value::Null)
        }));
        method.roles = vec!["admin".to_string()];
        // A dense-position violation would be a 500 if binding ever ran.
        method.parameters = vec![ParamDescriptor::new(7, ParamKind::Body)];

        let response = method.handle(request()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_raw_response_uses_sink() {
        let mut method = compiled(method_callback(|_instance, args: Vec<binder::Arg>| async move {
            let sink = args[0].as_response().unwrap();
            sink.set_status(StatusCode::ACCEPTED);
            sink.write("streamed");
            sink.end();
            // Raw methods' return values are ignored.
            Ok(json!("ignored"))
        }));
        method.raw_response = true;
        method.parameters = vec![ParamDescriptor::new(0, ParamKind::Response)];

        let response = method.handle(request()).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(response).await, "streamed");
    }

    #[tokio::test]
    async fn test_callback_error_maps_once() {
        let method = compiled(method_callback(|_instance, _args| async move {
            Err::<serde_json::Value, _>(ApiError::not_found("nothing here"))
        }));

        let response = method.handle(request()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("nothing here"));
    }
}
