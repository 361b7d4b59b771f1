//! Print the `OpenAPI` document as JSON for client codegen.
#![allow(clippy::print_stdout, clippy::expect_used)]

use fellowship_api::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    print!(
        "{}",
        ApiDoc::openapi()
            .to_pretty_json()
            .expect("OpenAPI document serializes")
    );
}
