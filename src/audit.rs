use crate::extract::EndpointKey;
use crate::report::{Warning, WarningKind};
use crate::spec::ApiSpecification;
use crate::verify::VerificationResult;
use std::collections::{BTreeMap, BTreeSet};

/// Keys the documentation covers, in specification terms: every verified
/// endpoint contributes the template it resolved to, plus its literal key.
pub fn documented_keys(results: &BTreeMap<EndpointKey, VerificationResult>) -> BTreeSet<EndpointKey> {
    let mut keys = BTreeSet::new();
    for (key, result) in results {
        if let Some(template) = &result.matched_template {
            keys.insert(EndpointKey::from_spec(&key.method, template));
        }
        keys.insert(key.clone());
    }
    keys
}

/// Specification operations nobody documents. Deprecated operations are
/// skipped unless `include_deprecated` is set.
pub fn undocumented(
    spec: &ApiSpecification,
    documented: &BTreeSet<EndpointKey>,
    include_deprecated: bool,
) -> Vec<Warning> {
    spec.operations()
        .filter(|(_, _, op)| include_deprecated || !op.deprecated)
        .map(|(method, template, _)| EndpointKey::from_spec(method, template))
        .filter(|key| !documented.contains(key))
        .map(|key| Warning {
            kind: WarningKind::UndocumentedEndpoint,
            message: format!("{key} exists in the API specification but is not documented"),
            endpoint: key.to_string(),
        })
        .collect()
}
