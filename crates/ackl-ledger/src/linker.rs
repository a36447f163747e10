use ackl_crypto::RecordHasher;
use ackl_types::{Digest, LedgerRecord, NewRecord};

/// Attaches backward links to records about to join the chain.
///
/// Purely computational; the caller supplies the predecessor from inside the
/// same write transaction that will persist the candidate.
pub struct ChainLinker;

impl ChainLinker {
    /// Link `candidate` to `last`, or mark it genesis when the ledger is empty.
    pub fn link(mut candidate: NewRecord, last: Option<&LedgerRecord>) -> NewRecord {
        candidate.back_link = Self::expected_link(last);
        candidate
    }

    /// The link a record must carry given its chain predecessor.
    pub fn expected_link(predecessor: Option<&LedgerRecord>) -> Option<Digest> {
        predecessor.map(RecordHasher::link_digest)
    }
}
