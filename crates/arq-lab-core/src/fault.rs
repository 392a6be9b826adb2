use arq_lab_abstract::{ArqConfig, SendOutcome, WireFrame};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::SocketAddr;
use tracing::debug;

use crate::transport::{Transport, TransportError};

/// Share of faults that corrupt the packet instead of dropping it.
const CORRUPTION_SHARE: f64 = 0.5;

/// Sends frames through a [`Transport`], dropping or corrupting a configured
/// percentage of them.
#[derive(Debug, Clone)]
pub struct FaultInjector<R = StdRng> {
    drop_percent: u8,
    rng: R,
}

impl FaultInjector<StdRng> {
    pub fn from_seed(drop_percent: u8, seed: u64) -> Self {
        Self::new(drop_percent, StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng(drop_percent: u8) -> Self {
        Self::new(drop_percent, StdRng::from_os_rng())
    }

    pub fn from_config(config: &ArqConfig) -> Self {
        match config.seed {
            Some(seed) => Self::from_seed(config.drop_percent, seed),
            None => Self::from_os_rng(config.drop_percent),
        }
    }

    /// Pass-through injector that never faults.
    pub fn reliable() -> Self {
        Self::from_seed(0, 0)
    }
}

impl<R: Rng> FaultInjector<R> {
    /// Percentages above 100 are clamped.
    pub fn new(drop_percent: u8, rng: R) -> Self {
        Self {
            drop_percent: drop_percent.min(100),
            rng,
        }
    }

    pub fn drop_percent(&self) -> u8 {
        self.drop_percent
    }

    /// Transmit `frame` to `dest`, unless the simulated link loses it.
    ///
    /// A corrupted frame crosses the wire with its flag set; the flag is
    /// cleared again before returning, so `frame` is left valid.
    pub async fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        frame: &mut WireFrame,
        dest: SocketAddr,
    ) -> Result<SendOutcome, TransportError> {
        let fault = self.rng.random_bool(f64::from(self.drop_percent) / 100.0);
        if !fault {
            transport.send_to(frame.as_bytes(), dest).await?;
            return Ok(SendOutcome::Ok);
        }

        if self.rng.random_bool(CORRUPTION_SHARE) {
            frame.mark_corrupted();
            let sent = transport.send_to(frame.as_bytes(), dest).await;
            frame.clear_corruption();
            sent?;
            debug!("corrupted {} bytes to {dest}", frame.len());
            Ok(SendOutcome::Corrupted)
        } else {
            debug!("dropped {} bytes to {dest}", frame.len());
            Ok(SendOutcome::Dropped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use arq_lab_abstract::{Packet, encode_ack, encode_data};

    #[tokio::test]
    async fn zero_percent_always_sends_identical_bytes() {
        let mut injector = FaultInjector::from_seed(0, 7);
        let mut transport = ScriptedTransport::new([]);
        let dest = transport.peer;
        for seq in 0..200 {
            let mut frame = encode_data(vec![seq as u8; 16], seq).unwrap();
            let expected = frame.as_bytes().to_vec();
            let outcome = injector.send(&mut transport, &mut frame, dest).await.unwrap();
            assert_eq!(outcome, SendOutcome::Ok);
            assert_eq!(transport.sent.last().unwrap().0, expected);
            assert_eq!(transport.sent.last().unwrap().1, dest);
        }
        assert_eq!(transport.sent.len(), 200);
    }

    #[tokio::test]
    async fn hundred_percent_splits_evenly_between_drop_and_corrupt() {
        const TRIALS: usize = 10_000;
        let mut injector = FaultInjector::from_seed(100, 42);
        let mut transport = ScriptedTransport::new([]);
        let dest = transport.peer;
        let mut corrupted = 0usize;
        let mut dropped = 0usize;

        for _ in 0..TRIALS {
            let mut frame = encode_ack(3);
            match injector.send(&mut transport, &mut frame, dest).await.unwrap() {
                SendOutcome::Ok => panic!("a certain fault must never send cleanly"),
                SendOutcome::Corrupted => corrupted += 1,
                SendOutcome::Dropped => dropped += 1,
            }
            assert!(frame.is_valid());
        }

        assert_eq!(corrupted + dropped, TRIALS);
        assert_eq!(transport.sent.len(), corrupted);
        let share = corrupted as f64 / TRIALS as f64;
        assert!((0.45..=0.55).contains(&share), "corrupted share {share}");
    }

    #[tokio::test]
    async fn corrupted_bytes_on_the_wire_carry_the_flag() {
        let mut injector = FaultInjector::from_seed(100, 1);
        let mut transport = ScriptedTransport::new([]);
        let dest = transport.peer;
        let mut frame = encode_data(&b"chunk"[..], 4).unwrap();

        loop {
            if injector.send(&mut transport, &mut frame, dest).await.unwrap()
                == SendOutcome::Corrupted
            {
                break;
            }
        }

        let wire = Packet::decode(&transport.sent[0].0).unwrap();
        assert!(!wire.is_valid());
        assert_eq!(wire.packet.payload(), b"chunk");
        assert!(frame.is_valid());
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(FaultInjector::from_seed(250, 0).drop_percent(), 100);
    }

    #[test]
    fn same_seed_same_decisions() {
        let mut a = FaultInjector::from_seed(50, 99);
        let mut b = FaultInjector::from_seed(50, 99);
        let draws_a: Vec<bool> = (0..64).map(|_| a.rng.random_bool(0.5)).collect();
        let draws_b: Vec<bool> = (0..64).map(|_| b.rng.random_bool(0.5)).collect();
        assert_eq!(draws_a, draws_b);
    }
}
