//! services/api/src/bin/openapi.rs
//!
//! This binary generates the OpenAPI 3.0 specification for the REST API
//! and writes it to `openapi.json`, for clients that want the contract
//! without a running server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

const SPEC_PATH: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(SPEC_PATH, spec_json)?;
    println!("✅ OpenAPI specification generated at {}", SPEC_PATH);
    Ok(())
}
