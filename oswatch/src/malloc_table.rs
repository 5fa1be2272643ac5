//! The malloc-event hash table: a fixed-size array of singly-linked
//! bucket lists, keyed by address, mirroring the original tool's
//! addressing scheme exactly (`(addr >> 3) % buckets`). Everything
//! else in this crate can use ordinary collections; this one's
//! invariants (§8 of the design doc) are pinned to this layout.

struct Node {
    address: u64,
    size: u64,
    next: Option<Box<Node>>,
}

pub struct MallocTable {
    buckets: Vec<Option<Box<Node>>>,
    mask: u64,

    pub allocations: u64,
    pub frees: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    pub double_free_count: u64,
}

impl MallocTable {
    pub fn new(bucket_count: usize) -> MallocTable {
        assert!(
            bucket_count.is_power_of_two(),
            "malloc table bucket count must be a power of two"
        );

        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, || None);

        MallocTable {
            buckets,
            mask: (bucket_count - 1) as u64,
            allocations: 0,
            frees: 0,
            bytes_allocated: 0,
            bytes_freed: 0,
            double_free_count: 0,
        }
    }

    fn bucket_index(&self, address: u64) -> usize {
        ((address >> 3) & self.mask) as usize
    }

    pub fn track_alloc(&mut self, address: u64, size: u64) {
        let idx = self.bucket_index(address);
        let node = Box::new(Node {
            address,
            size,
            next: self.buckets[idx].take(),
        });
        self.buckets[idx] = Some(node);

        self.allocations += 1;
        self.bytes_allocated += size;
    }

    /// Unlinks the block at `address` if present. Returns `true` on a
    /// match; a miss is a potential double-free and only bumps the
    /// advisory counter.
    pub fn track_free(&mut self, address: u64) -> bool {
        let idx = self.bucket_index(address);
        let mut current = &mut self.buckets[idx];

        while let Some(node) = current {
            if node.address == address {
                let size = node.size;
                let next = node.next.take();
                *current = next;

                self.frees += 1;
                self.bytes_freed += size;
                return true;
            }
            current = &mut current.as_mut().unwrap().next;
        }

        self.double_free_count += 1;
        false
    }

    pub fn live_count(&self) -> u64 {
        self.allocations - self.frees
    }

    /// Visits every live block exactly once; bucket order is
    /// unspecified but deterministic within a process.
    pub fn residual_blocks(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        for bucket in &self.buckets {
            let mut node = bucket.as_deref();
            while let Some(n) = node {
                out.push((n.address, n.size));
                node = n.next.as_deref();
            }
        }
        out
    }
}

/// One event parsed off the interceptor's wire format.
#[derive(Debug, PartialEq, Eq)]
pub enum MallocEvent {
    Alloc { address: u64, size: u64 },
    Free { address: u64 },
}

/// Incremental line-oriented parser for the `ALLOC`/`FREE` wire
/// format. Preserves a truncated tail line across `feed` calls so a
/// read that splits a line mid-buffer doesn't drop it.
#[derive(Default)]
pub struct EventLineParser {
    pending: Vec<u8>,
}

impl EventLineParser {
    pub fn new() -> EventLineParser {
        EventLineParser::default()
    }

    pub fn feed(&mut self, data: &[u8]) -> Vec<MallocEvent> {
        self.pending.extend_from_slice(data);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            if let Some(event) = parse_line(&self.pending[start..end]) {
                events.push(event);
            }
            start = end + 1;
        }
        self.pending.drain(0..start);
        events
    }
}

fn parse_line(line: &[u8]) -> Option<MallocEvent> {
    let line = std::str::from_utf8(line).ok()?;
    if let Some(rest) = line.strip_prefix("ALLOC ") {
        let mut parts = rest.split_whitespace();
        let addr = parse_hex_pointer(parts.next()?)?;
        let size = parts.next()?.parse::<u64>().ok()?;
        Some(MallocEvent::Alloc {
            address: addr,
            size,
        })
    } else if let Some(rest) = line.strip_prefix("FREE ") {
        let addr = parse_hex_pointer(rest.split_whitespace().next()?)?;
        Some(MallocEvent::Free { address: addr })
    } else {
        None
    }
}

fn parse_hex_pointer(token: &str) -> Option<u64> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_round_trips() {
        let mut table = MallocTable::new(1024);
        table.track_alloc(0x1000, 500);
        assert_eq!(table.live_count(), 1);

        assert!(table.track_free(0x1000));
        assert_eq!(table.live_count(), 0);
        assert_eq!(table.bytes_allocated, 500);
        assert_eq!(table.bytes_freed, 500);
    }

    #[test]
    fn free_of_unknown_address_is_advisory_double_free() {
        let mut table = MallocTable::new(1024);
        assert!(!table.track_free(0x9999));
        assert_eq!(table.double_free_count, 1);
    }

    #[test]
    fn residual_blocks_match_mixed_alloc_pattern() {
        // malloc(200); free; malloc(300); malloc(400); free; malloc(500)
        let mut table = MallocTable::new(1024);
        table.track_alloc(1, 200);
        table.track_free(1);
        table.track_alloc(2, 300);
        table.track_alloc(3, 400);
        table.track_free(3);
        table.track_alloc(4, 500);

        let mut sizes: Vec<u64> = table.residual_blocks().iter().map(|(_, s)| *s).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![300, 500]);
    }

    #[test]
    fn bucket_collision_walks_the_chain() {
        let mut table = MallocTable::new(2);
        // addresses 0 and 8 both hash to bucket 0 for a 2-bucket table.
        table.track_alloc(0, 10);
        table.track_alloc(8, 20);
        assert_eq!(table.live_count(), 2);

        assert!(table.track_free(8));
        assert_eq!(table.live_count(), 1);
        assert_eq!(table.residual_blocks(), vec![(0, 10)]);
    }

    #[test]
    fn parser_handles_line_split_across_feeds() {
        let mut parser = EventLineParser::new();
        let events = parser.feed(b"ALLOC 0x1000 10");
        assert!(events.is_empty());

        let events = parser.feed(b"24\nFREE 0x1000\n");
        assert_eq!(
            events,
            vec![
                MallocEvent::Alloc {
                    address: 0x1000,
                    size: 1024
                },
                MallocEvent::Free { address: 0x1000 }
            ]
        );
    }

    #[test]
    fn parser_discards_unrecognized_lines() {
        let mut parser = EventLineParser::new();
        let events = parser.feed(b"GARBAGE line\nALLOC 0x2000 16\n");
        assert_eq!(
            events,
            vec![MallocEvent::Alloc {
                address: 0x2000,
                size: 16
            }]
        );
    }
}
