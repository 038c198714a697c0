// src/aggregate/interleave.rs
use super::types::CanonicalListing;

/// Round-robin merge by `source`.
///
/// Records are grouped by source in order of first appearance (order within a group is
/// kept), then round `i` takes element `i` of every group that still has one. The output
/// is a permutation of the input, so no high-volume source can crowd the head of the list.
pub fn interleave(records: Vec<CanonicalListing>) -> Vec<CanonicalListing> {
    let total = records.len();
    let mut groups: Vec<(String, std::vec::IntoIter<CanonicalListing>)> = Vec::new();
    {
        let mut buckets: Vec<(String, Vec<CanonicalListing>)> = Vec::new();
        for rec in records {
            match buckets.iter_mut().find(|(src, _)| *src == rec.source) {
                Some((_, bucket)) => bucket.push(rec),
                None => buckets.push((rec.source.clone(), vec![rec])),
            }
        }
        for (src, bucket) in buckets {
            groups.push((src, bucket.into_iter()));
        }
    }

    let mut out = Vec::with_capacity(total);
    loop {
        let before = out.len();
        for (_, it) in groups.iter_mut() {
            if let Some(rec) = it.next() {
                out.push(rec);
            }
        }
        if out.len() == before {
            break;
        }
    }
    out
}
