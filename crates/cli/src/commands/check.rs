//! `advisorguard check`: ask the PDP about one subject/action/resource triple.

use super::{SubjectArgs, load_config, parse_attribute};
use advisorguard_core::{PolicyDecisionPoint, ResourceDescriptor};
use advisorguard_pdp::HttpPdpClient;

pub async fn run(
    action: String,
    resource_type: String,
    key: Option<String>,
    attributes: Vec<String>,
    subject: SubjectArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let resource = build_resource(resource_type, key, &attributes)?;
    let subject = subject.into_subject();

    let pdp = HttpPdpClient::from_config(&config.pdp)?;
    let allowed = pdp.check(&subject, &action, &resource).await?;

    let verdict = if allowed { "ALLOW" } else { "DENY" };
    println!(
        "{verdict}  {} {action} {}{}",
        subject.key(),
        resource.resource_type,
        resource.key.as_deref().map(|k| format!(":{k}")).unwrap_or_default()
    );
    Ok(())
}

fn build_resource(
    resource_type: String,
    key: Option<String>,
    attributes: &[String],
) -> Result<ResourceDescriptor, String> {
    let mut resource = ResourceDescriptor::new(resource_type);
    if let Some(key) = key {
        resource = resource.with_key(key);
    }
    for raw in attributes {
        let (name, value) = parse_attribute(raw)?;
        resource = resource.with_attribute(name, value);
    }
    Ok(resource)
}
