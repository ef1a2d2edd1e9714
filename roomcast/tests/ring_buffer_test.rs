/// Integration tests for the capture/playback ring buffer
///
/// Exercise the SPSC contract under long, irregular sequences of writes and
/// reads, including wrap-around at the storage boundary.

use roomcast_lib::audio::buffer::RingBuffer;

/// Small deterministic generator so runs are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

#[test]
fn test_fill_plus_free_equals_capacity() {
    println!("\n=== Ring Fill/Free Invariant Test ===");

    let capacity = 97;
    let (mut producer, mut consumer) = RingBuffer::new(capacity);
    let mut rng = Lcg(7);

    for step in 0..10_000 {
        if rng.next(2) == 0 {
            let len = rng.next(producer.free_count() + 1);
            producer.push_silence(len).unwrap();
        } else {
            let len = rng.next(consumer.fill_count() + 1);
            consumer.advance_read(len);
        }

        assert_eq!(
            producer.fill_count() + producer.free_count(),
            capacity,
            "producer view broken at step {}",
            step
        );
        assert_eq!(
            consumer.fill_count() + consumer.free_count(),
            capacity,
            "consumer view broken at step {}",
            step
        );
    }

    println!("\n✓ fill + free == capacity held for 10000 steps");
}

#[test]
fn test_fifo_round_trip_with_wrap() {
    println!("\n=== Ring FIFO Round-Trip Test ===");

    let (mut producer, mut consumer) = RingBuffer::new(64);
    let mut rng = Lcg(42);

    let mut next_byte: u8 = 0;
    let mut expected: u8 = 0;
    let mut total_read = 0usize;

    for _ in 0..5_000 {
        let write_len = rng.next(producer.free_count() + 1);
        let chunk: Vec<u8> = (0..write_len)
            .map(|_| {
                let b = next_byte;
                next_byte = next_byte.wrapping_add(1);
                b
            })
            .collect();
        producer.push_slice(&chunk).unwrap();

        let read_len = rng.next(consumer.fill_count() + 1);
        let mut out = vec![0u8; read_len];
        assert_eq!(consumer.pop_into(&mut out), read_len);

        for byte in out {
            assert_eq!(byte, expected, "byte {} out of order", total_read);
            expected = expected.wrapping_add(1);
            total_read += 1;
        }
    }

    println!("Read {} bytes in order", total_read);
    println!("\n✓ FIFO order preserved across wrap-around");
}

#[test]
fn test_write_beyond_free_space_rejected() {
    println!("\n=== Ring Overfill Test ===");

    let (mut producer, consumer) = RingBuffer::new(8);
    producer.push_slice(&[1; 6]).unwrap();

    let result = producer.push_slice(&[2; 3]);
    println!("Result: {:?}", result);
    assert!(result.is_err());
    assert_eq!(consumer.fill_count(), 6, "a rejected write must not publish bytes");

    println!("\n✓ Oversized write rejected without partial commit");
}

#[test]
fn test_clear_resets_fill() {
    let (mut producer, mut consumer) = RingBuffer::new(16);
    producer.push_slice(&[1, 2, 3, 4, 5]).unwrap();

    assert_eq!(consumer.clear(), 5);
    assert_eq!(consumer.fill_count(), 0);
    assert_eq!(producer.free_count(), 16);

    producer.push_slice(&[9]).unwrap();
    let mut out = [0u8; 1];
    consumer.pop_into(&mut out);
    assert_eq!(out, [9]);
}
