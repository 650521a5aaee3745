use std::sync::atomic::{AtomicU64, Ordering};

/// 発行済みリクエストの識別子（単調増加）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// リクエスト順序付け
///
/// 最後に発行したチケットだけが「最新」。完了時に `is_latest` が false の結果は捨てる。
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_monotonic() {
        let seq = RequestSequencer::new();
        let a = seq.issue();
        let b = seq.issue();
        assert!(b > a);
        assert_eq!(a.sequence(), 1);
        assert_eq!(b.sequence(), 2);
    }

    #[test]
    fn test_only_latest_ticket_is_current() {
        let seq = RequestSequencer::new();
        let older = seq.issue();
        assert!(seq.is_latest(older));

        let newer = seq.issue();
        assert!(!seq.is_latest(older));
        assert!(seq.is_latest(newer));
    }
}
