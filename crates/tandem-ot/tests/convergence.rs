//! Convergence checks through the full document pipeline.
//!
//! Two concurrent operations must produce the same text regardless of which
//! one the server commits first, and a client that replays the committed log
//! from its own base revision must land on exactly the server's text.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tandem_ot::{Document, Operation};
use tandem_types::ClientId;

fn two_clients() -> (ClientId, ClientId) {
    let a = ClientId::new();
    let b = ClientId::new();
    if a < b { (a, b) } else { (b, a) }
}

/// Apply `first` then `second` to a fresh copy of `seed`, both based on
/// revision 0.
fn commit_pair(seed: &str, first: &Operation, second: &Operation) -> String {
    let mut doc = Document::from_text(seed);
    doc.apply(first.clone()).unwrap();
    doc.apply(second.clone()).unwrap();
    doc.text().to_string()
}

/// Every single-splice shape touching a document of `len` chars.
fn all_shapes(client: ClientId, len: usize, text: &str) -> Vec<Operation> {
    let mut ops = Vec::new();
    for pos in 0..=len {
        ops.push(Operation::insert(client, 0, pos, text));
        for deleted in 1..=(len - pos) {
            ops.push(Operation::delete(client, 0, pos, deleted));
            ops.push(Operation::replace(client, 0, pos, deleted, text));
        }
    }
    ops
}

#[test]
fn concurrent_pairs_converge_in_either_order() {
    let (a, b) = two_clients();
    let seed = "abcdef";
    for op_a in all_shapes(a, seed.len(), "XX") {
        for op_b in all_shapes(b, seed.len(), "Y") {
            let ab = commit_pair(seed, &op_a, &op_b);
            let ba = commit_pair(seed, &op_b, &op_a);
            assert_eq!(
                ab, ba,
                "diverged for {op_a:?} vs {op_b:?} on {seed:?}"
            );
        }
    }
}

#[test]
fn random_concurrent_pairs_converge() {
    let (a, b) = two_clients();
    let mut rng = StdRng::seed_from_u64(0x7a6d);
    let alphabet = ['q', 'w', 'e', 'r', 't', 'y'];

    for round in 0..500 {
        let len = rng.gen_range(1..20);
        let seed: String = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();

        let mut random_op = |client: ClientId| {
            let pos = rng.gen_range(0..=len);
            let deleted = rng.gen_range(0..=(len - pos));
            let inserted: String = (0..rng.gen_range(0..4))
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            Operation {
                client,
                base_revision: 0,
                pos,
                deleted,
                inserted,
            }
        };
        let op_a = random_op(a);
        let op_b = random_op(b);

        let ab = commit_pair(&seed, &op_a, &op_b);
        let ba = commit_pair(&seed, &op_b, &op_a);
        assert_eq!(
            ab, ba,
            "round {round} diverged for {op_a:?} vs {op_b:?} on {seed:?}"
        );
    }
}

#[test]
fn replaying_committed_log_matches_server_text() {
    // A client stuck at an old revision catches up by applying the
    // committed ops from its base onward, verbatim and in order.
    let (a, b) = two_clients();
    let mut server = Document::from_text("fn main() {}");

    server.apply(Operation::insert(a, 0, 11, " println!();")).unwrap();
    server.apply(Operation::insert(b, 0, 3, "_x")).unwrap();
    server.apply(Operation::replace(a, 2, 0, 2, "pub fn")).unwrap();
    server.apply(Operation::delete(b, 1, 5, 3)).unwrap();

    for base in 0..=server.revision() {
        // Reconstruct the text as of `base` by replaying the prefix, then
        // catch up with ops_since.
        let mut replica = Document::from_text("fn main() {}");
        for entry in server.ops_since(0) {
            if entry.revision > base {
                break;
            }
            let mut op = entry.op.clone();
            op.base_revision = replica.revision();
            replica.apply(op).unwrap();
        }
        for entry in server.ops_since(base) {
            let mut op = entry.op.clone();
            op.base_revision = replica.revision();
            replica.apply(op).unwrap();
        }
        assert_eq!(replica.text(), server.text(), "replay from base {base}");
    }
}

#[test]
fn no_accepted_operation_is_lost() {
    let (a, b) = two_clients();
    let mut rng = StdRng::seed_from_u64(99);
    let mut server = Document::from_text("0123456789");
    let mut accepted = 0u64;

    for _ in 0..200 {
        let client = if rng.gen_bool(0.5) { a } else { b };
        // Ops may be based a few revisions behind the server's head.
        let lag = rng.gen_range(0..4).min(server.revision());
        let base = server.revision() - lag;
        let len = server.len_chars();
        let pos = rng.gen_range(0..=len);
        let deleted = rng.gen_range(0..=(len - pos).min(3));
        let op = Operation {
            client,
            base_revision: base,
            pos,
            deleted,
            inserted: if rng.gen_bool(0.7) { "ab".into() } else { String::new() },
        };
        if server.apply(op).is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(server.revision(), accepted);
    let log = server.ops_since(0);
    assert_eq!(log.len() as u64, accepted);
    for (i, entry) in log.iter().enumerate() {
        assert_eq!(entry.revision, i as u64 + 1, "log revisions are dense");
    }
}
