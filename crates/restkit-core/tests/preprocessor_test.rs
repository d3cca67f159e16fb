//! Preprocessor pipeline integration tests
//!
//! Covers validation-before-dispatch, short-circuiting, class-before-method
//! ordering and sync/async sequencing through the full pipeline.

use http::{Method, StatusCode};
use restkit_core::{
    async_preprocessor_fn, method_callback, preprocessor_fn, service_constructor, ApiError,
    Application, ClassOptions, MetadataRegistry, MethodOptions, ParamDescriptor, ParamKind,
    Request, ServiceId, TestClient, TestRequest,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

struct PreprocessedService;

fn service_id() -> ServiceId {
    ServiceId::of::<PreprocessedService>()
}

fn flag(request: &Request, name: &str) -> bool {
    request
        .attribute(name)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn body_flag(request: &Request, name: &str) -> bool {
    request
        .json()
        .and_then(|b| b.get(name))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn register(registry: &mut MetadataRegistry) {
    registry.register_class(
        service_id(),
        ClassOptions {
            path: Some("preprocessor".to_string()),
            preprocessors: vec![preprocessor_fn(|req| {
                if !body_flag(req, "valid") {
                    return Err(ApiError::bad_request("body is not valid"));
                }
                req.set_attribute("preprocessor1", true);
                Ok(())
            })],
            constructor: Some(service_constructor(|| PreprocessedService)),
            ..Default::default()
        },
    );

    registry.register_method(
        service_id(),
        "test",
        MethodOptions {
            verb: Some(Method::POST),
            path: Some("test".to_string()),
            preprocessors: vec![preprocessor_fn(|req| {
                req.set_attribute("preprocessor2", true);
                Ok(())
            })],
            parameters: vec![
                ParamDescriptor::new(0, ParamKind::JsonBody),
                ParamDescriptor::new(1, ParamKind::Request),
            ],
            callback: Some(method_callback(|_instance, args| async move {
                let request = args[1].as_request().expect("request argument");
                Ok(json!(
                    flag(request, "preprocessor1") && flag(request, "preprocessor2")
                ))
            })),
            ..Default::default()
        },
    );

    registry.register_method(
        service_id(),
        "asynctest",
        MethodOptions {
            verb: Some(Method::POST),
            path: Some("asynctest".to_string()),
            preprocessors: vec![
                async_preprocessor_fn(|req| {
                    Box::pin(async move {
                        if !body_flag(req, "asyncValid") {
                            return Err(ApiError::bad_request("body is not valid"));
                        }
                        req.set_attribute("async_preprocessor1", true);
                        Ok(())
                    })
                }),
                async_preprocessor_fn(|req| {
                    Box::pin(async move {
                        // Only attached when the first async preprocessor
                        // already ran, proving sequential execution.
                        if flag(req, "async_preprocessor1") {
                            req.set_attribute("async_preprocessor2", true);
                        }
                        Ok(())
                    })
                }),
            ],
            parameters: vec![ParamDescriptor::new(0, ParamKind::Request)],
            callback: Some(method_callback(|_instance, args| async move {
                let request = args[0].as_request().expect("request argument");
                Ok(json!(
                    flag(request, "preprocessor1")
                        && !flag(request, "preprocessor2")
                        && flag(request, "async_preprocessor1")
                        && flag(request, "async_preprocessor2")
                ))
            })),
            ..Default::default()
        },
    );
}

fn client() -> TestClient {
    let app = Application::new().configure(register).mount(service_id());
    TestClient::new(&app)
}

#[tokio::test]
async fn test_valid_body_reaches_handler() {
    let response = client()
        .request(TestRequest::post("/preprocessor/test").json(&json!({"valid": true})))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "true");
}

#[tokio::test]
async fn test_invalid_body_fails_validation() {
    let response = client()
        .request(TestRequest::post("/preprocessor/test").json(&json!({})))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_async_preprocessors_run_in_sequence() {
    let response = client()
        .request(
            TestRequest::post("/preprocessor/asynctest")
                .json(&json!({"valid": true, "asyncValid": true})),
        )
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "true");
}

#[tokio::test]
async fn test_async_validation_failure() {
    let response = client()
        .request(TestRequest::post("/preprocessor/asynctest").json(&json!({"valid": true})))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_class_preprocessors_run_before_method_ones() {
    struct OrderedService;

    let order = Arc::new(Mutex::new(Vec::new()));
    let class_order = order.clone();
    let method_order = order.clone();

    // The method descriptor is registered before the class descriptor;
    // execution order must not depend on that.
    let app = Application::new()
        .configure(move |registry| {
            registry.register_method(
                ServiceId::of::<OrderedService>(),
                "probe",
                MethodOptions {
                    verb: Some(Method::GET),
                    path: Some("probe".to_string()),
                    preprocessors: vec![preprocessor_fn(move |_req| {
                        method_order.lock().unwrap().push("method");
                        Ok(())
                    })],
                    callback: Some(method_callback(|_instance, _args| async move {
                        Ok(json!("done"))
                    })),
                    ..Default::default()
                },
            );
            registry.register_class(
                ServiceId::of::<OrderedService>(),
                ClassOptions {
                    path: Some("ordered".to_string()),
                    preprocessors: vec![preprocessor_fn(move |_req| {
                        class_order.lock().unwrap().push("class");
                        Ok(())
                    })],
                    constructor: Some(service_constructor(|| OrderedService)),
                    ..Default::default()
                },
            );
        })
        .mount(ServiceId::of::<OrderedService>());

    let response = TestClient::new(&app).get("/ordered/probe").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(*order.lock().unwrap(), vec!["class", "method"]);
}

#[tokio::test]
async fn test_failed_preprocessor_skips_the_rest_of_the_chain() {
    struct RejectingService;

    let reached = Arc::new(Mutex::new(false));
    let reached_in_chain = reached.clone();

    let app = Application::new()
        .configure(move |registry| {
            let reached_in_chain = reached_in_chain.clone();
            registry.register_class(
                ServiceId::of::<RejectingService>(),
                ClassOptions {
                    path: Some("rejecting".to_string()),
                    constructor: Some(service_constructor(|| RejectingService)),
                    ..Default::default()
                },
            );
            registry.register_method(
                ServiceId::of::<RejectingService>(),
                "probe",
                MethodOptions {
                    verb: Some(Method::GET),
                    path: Some("probe".to_string()),
                    preprocessors: vec![
                        preprocessor_fn(|_req| Err(ApiError::bad_request("nope"))),
                        preprocessor_fn(move |_req| {
                            *reached_in_chain.lock().unwrap() = true;
                            Ok(())
                        }),
                    ],
                    callback: Some(method_callback(|_instance, _args| async move {
                        Ok(json!("unreachable"))
                    })),
                    ..Default::default()
                },
            );
        })
        .mount(ServiceId::of::<RejectingService>());

    let response = TestClient::new(&app).get("/rejecting/probe").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(!*reached.lock().unwrap());
}
