//! # AdvisorGuard PDP
//!
//! Everything that talks to the policy decision point:
//! - [`HttpPdpClient`] answers the gates' checks over HTTP
//! - [`PolicyCatalog`] describes the resources, roles and rules a deployment needs
//! - [`ProvisioningClient`] pushes a catalog to the PDP's management API

pub mod catalog;
pub mod client;
pub mod provision;

pub use catalog::{BUILTIN_CATALOGS, CatalogError, PolicyCatalog};
pub use client::HttpPdpClient;
pub use provision::{ApiScope, ProvisionError, ProvisionReport, ProvisioningClient};
