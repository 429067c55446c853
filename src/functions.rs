//! Functions bundled with the `reverb` binary.

use std::time::Duration;

use reverb_function::{FunctionDescriptor, FunctionRegistry, HandlerFailure, RegistryError};
use serde_json::{Value, json};

/// Build the registry served by `reverb serve`.
pub fn registry() -> Result<FunctionRegistry, RegistryError> {
  let mut builder = FunctionRegistry::builder();
  builder
    .register("welcome-email", welcome_email())?
    .register("render-greeting", render_greeting())?;
  Ok(builder.build())
}

/// Greets a new user after a short cool-off period.
fn welcome_email() -> FunctionDescriptor {
  FunctionDescriptor::from_fn("welcome-email", "user.signup", |event, step| {
    let name: String = step.run("lookup-name", || {
      event
        .payload
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HandlerFailure::recognized("payload.name is required"))
    })?;

    step.sleep("cool-off", Duration::from_secs(5))?;

    let greeting: String = step.invoke("render", "render-greeting", json!({ "name": name }))?;
    Ok(json!({ "to": name, "body": greeting, "sent": true }))
  })
}

fn render_greeting() -> FunctionDescriptor {
  FunctionDescriptor::from_fn("render-greeting", "render-greeting", |event, _| {
    let name = event
      .payload
      .as_ref()
      .and_then(|p| p.get("name"))
      .and_then(Value::as_str)
      .unwrap_or("friend");
    Ok(json!(format!("Welcome aboard, {}!", name)))
  })
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use reverb_function::{Event, StepCache, StepOutcome};
  use reverb_gateway::{Gateway, RpcRequest};

  use super::*;

  #[test]
  fn test_registry_triggers() {
    let registry = registry().unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.triggered_by("user.signup"), ["welcome-email"]);
  }

  #[test]
  fn test_welcome_email_resumes_to_done() {
    let gateway = Gateway::new(Arc::new(registry().unwrap()));
    let event = Event::new("user.signup").with_payload(json!({ "name": "Ada" }));

    let mut cache = StepCache::new();
    cache.insert("lookup-name", json!("Ada")).unwrap();
    cache.insert("cool-off", Value::Null).unwrap();
    cache.insert("render", json!("Welcome aboard, Ada!")).unwrap();

    let reply = gateway.dispatch(
      RpcRequest::new("welcome-email", event)
        .with_id("exec-1")
        .with_cache(cache),
    );
    assert_eq!(
      reply.outcome(),
      Some(&StepOutcome::Done {
        value: json!({ "to": "Ada", "body": "Welcome aboard, Ada!", "sent": true }),
      })
    );
  }

  #[test]
  fn test_welcome_email_requires_name() {
    let gateway = Gateway::new(Arc::new(registry().unwrap()));
    let reply = gateway.dispatch(RpcRequest::new("welcome-email", Event::new("user.signup")).with_id("exec-2"));
    assert_eq!(reply.error(), Some("payload.name is required"));
  }
}
