//! Reseed boundary (§4.5, §6): when the netDb knows too few routers to
//! bootstrap floodfill lookups on its own, a reseed fetches a batch of
//! signed RouterInfo blobs from an out-of-band source. Parsing the SU3
//! container format and fetching over HTTPS both live outside the
//! router core; this module only defines the trait the core needs and
//! the minimal validation it performs before handing entries to the
//! netDb.

use crate::data::RouterInfo;
use crate::error::{Error, Result};

/// A source of bootstrap RouterInfos. Production code implements this
/// against SU3-signed bundles fetched from the hardcoded reseed hosts;
/// tests implement it with a fixed in-memory list.
pub trait Reseeder {
    /// Returns freshly fetched RouterInfo blobs, already SU3-signature
    /// checked by the implementation. The core only re-validates each
    /// entry's own RouterIdentity signature before storing it.
    fn fetch(&self) -> Result<Vec<RouterInfo>>;
}

/// Validates a batch of reseed-supplied RouterInfos, dropping (not
/// erroring on) any whose self-signature doesn't check out — a
/// malformed or hostile entry in the batch must not block the rest.
pub fn validate_batch(entries: Vec<RouterInfo>) -> Vec<RouterInfo> {
    entries
        .into_iter()
        .filter(|ri| ri.verify().is_ok())
        .collect()
}

/// A `Reseeder` that always fails; used when no reseed hosts are
/// configured and the router must bootstrap from known peers alone.
pub struct NullReseeder;

impl Reseeder for NullReseeder {
    fn fetch(&self) -> Result<Vec<RouterInfo>> {
        Err(Error::parse("reseed", "no reseed source configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigType;
    use crate::data::RouterSecretKeys;

    #[test]
    fn validate_batch_drops_bad_signatures() {
        let rsk = RouterSecretKeys::generate_with(SigType::Ed25519);
        let mut good = RouterInfo::new(rsk.rid.clone());
        good.sign(&rsk.signing_private_key);

        let mut bad = RouterInfo::new(rsk.rid);
        bad.sign(&rsk.signing_private_key);
        bad.set_caps("tampered-after-signing");

        let kept = validate_batch(vec![good, bad]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn null_reseeder_fails() {
        assert!(NullReseeder.fetch().is_err());
    }
}
