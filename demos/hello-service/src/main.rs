//! Hello service demo for restkit
//!
//! Run with: cargo run -p hello-service
//!
//! Then try:
//!   curl http://127.0.0.1:8080/hello
//!   curl http://127.0.0.1:8080/hello/users/42
//!   curl http://127.0.0.1:8080/hello/health

use http::Method;
use restkit_core::{
    method_callback, service_constructor, Application, ClassOptions, MetadataRegistry,
    MethodOptions, ParamDescriptor, ParamKind, ServiceId,
};
use serde_json::json;

struct HelloService;

fn hello_id() -> ServiceId {
    ServiceId::of::<HelloService>()
}

fn register(registry: &mut MetadataRegistry) {
    registry.register_class(
        hello_id(),
        ClassOptions {
            path: Some("hello".to_string()),
            constructor: Some(service_constructor(|| HelloService)),
            ..Default::default()
        },
    );

    registry.register_method(
        hello_id(),
        "hello",
        MethodOptions {
            verb: Some(Method::GET),
            callback: Some(method_callback(|_instance, _args| async move {
                Ok(json!({"message": "Hello, World!"}))
            })),
            ..Default::default()
        },
    );

    registry.register_method(
        hello_id(),
        "get_user",
        MethodOptions {
            verb: Some(Method::GET),
            path: Some("users/{id}".to_string()),
            parameters: vec![ParamDescriptor::new(
                0,
                ParamKind::PathParam("id".to_string()),
            )],
            callback: Some(method_callback(|_instance, args| async move {
                let id = args[0].as_str().unwrap_or("unknown");
                Ok(json!({"id": id, "name": format!("User {}", id)}))
            })),
            ..Default::default()
        },
    );

    registry.register_method(
        hello_id(),
        "health",
        MethodOptions {
            verb: Some(Method::GET),
            path: Some("health".to_string()),
            callback: Some(method_callback(|_instance, _args| async move {
                Ok(json!("OK"))
            })),
            ..Default::default()
        },
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Application::new()
        .configure(register)
        .mount(hello_id())
        .run("127.0.0.1:8080")
        .await
}
