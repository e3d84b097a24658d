//! Export the `OpenAPI` schema as JSON for client codegen.
//!
//! Usage: `cargo run --bin export_openapi > openapi.json`

#![allow(clippy::print_stdout, clippy::expect_used)]

use utoipa::OpenApi;
use vormiaquery_api::rest::ApiDoc;

fn main() {
    print!(
        "{}",
        ApiDoc::openapi()
            .to_pretty_json()
            .expect("OpenAPI JSON serialization failed")
    );
}
