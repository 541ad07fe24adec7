use super::config::{Action, CallRequest, CallTarget};
use anyhow::Context;
use gamelink::{Client, types::ProtocolNumber};
use serde_json::{Value, json};

/// Execute `action` against `client` and print the result to stdout as JSON.
pub async fn run(client: &Client, action: Action) -> anyhow::Result<()> {
    let output = match action {
        Action::Services => services(client),
        Action::Resolve(target) => resolve(client, &target)?,
        Action::Call(request) => call(client, request).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn services(client: &Client) -> Value {
    client
        .registry()
        .entries()
        .into_iter()
        .map(|(pnum, route)| json!({ "protocol": pnum, "service": route.service, "node": route.node }))
        .collect()
}

fn resolve(client: &Client, target: &str) -> anyhow::Result<Value> {
    if let Ok(pnum) = target.parse::<ProtocolNumber>() {
        let route = client.resolve_by_number(pnum)?;
        return Ok(json!({ "protocol": pnum, "service": route.service, "node": route.node }));
    }

    let pnum = client.resolve_by_name(target)?;
    let route = client.resolve_by_number(pnum)?;
    Ok(json!({ "protocol": pnum, "service": target, "node": route.node }))
}

async fn call(client: &Client, request: CallRequest) -> anyhow::Result<Value> {
    let (service, routed_node) = match request.target {
        CallTarget::Number(pnum) => {
            let route = client.resolve_by_number(pnum)?;
            (route.service, route.node)
        }
        CallTarget::Service(service) => {
            let pnum = client.resolve_by_name(&service)?;
            let route = client.resolve_by_number(pnum)?;
            (service, route.node)
        }
    };
    let node = request.node.unwrap_or(routed_node);

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Calling {service} on {node} ({})",
        client.connections().address(&node).unwrap_or("unknown address")
    );

    let reply = if request.stream {
        let mut stream = client
            .open_stream_with_metadata(&node, request.metadata)
            .await
            .with_context(|| format!("failed to open stream to {node}"))?;
        let reply: Option<(Value,)> = stream.call(&service, &request.payload).await?;
        stream.close_send();
        reply.map(|(value,)| value)
    } else {
        client.call(&node, &service, &request.payload).await?
    };

    Ok(json!({ "node": node, "service": service, "reply": reply }))
}
