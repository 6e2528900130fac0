//! Named response validators.
//!
//! Validators are registered on a route under a name and run on demand
//! against the last recorded response.

use std::collections::HashMap;
use std::sync::Arc;

use crate::RouteError;
use crate::transport::Response;

/// A named response check registered on a route.
pub type ValidatorFn = Arc<dyn Fn(&Response) -> Result<(), RouteError> + Send + Sync>;

/// Validator requiring an exact status code.
pub fn expect_status(expected: u16) -> impl Fn(&Response) -> Result<(), RouteError> {
    move |response: &Response| {
        let got = response.status_code();
        if got == expected {
            Ok(())
        } else {
            Err(RouteError::Validation(format!(
                "expected status {expected}, got {got}"
            )))
        }
    }
}

/// Validator requiring each expected header to be present with an exact
/// value. Header names match case-insensitively.
pub fn expect_headers(
    expected: HashMap<String, String>,
) -> impl Fn(&Response) -> Result<(), RouteError> {
    move |response: &Response| {
        for (name, want) in &expected {
            match response.header(name) {
                Some(got) if got == want => {}
                got => {
                    return Err(RouteError::Validation(format!(
                        "expected header {name}: {want}, got {got:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}
