use bytes::Bytes;
use std::io;
use std::path::Path;

/// Split `data` into consecutive chunks of at most `capacity` bytes.
/// Empty input yields no chunks.
pub fn split_payload(data: Bytes, capacity: usize) -> impl Iterator<Item = Bytes> {
    let capacity = capacity.max(1);
    let len = data.len();
    (0..len)
        .step_by(capacity)
        .map(move |start| data.slice(start..(start + capacity).min(len)))
}

/// Read a whole file and split it for transmission.
pub async fn read_chunks(path: impl AsRef<Path>, capacity: usize) -> io::Result<Vec<Bytes>> {
    let data = tokio::fs::read(path).await?;
    Ok(split_payload(Bytes::from(data), capacity).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_chunk_holds_the_remainder() {
        let chunks: Vec<Bytes> = split_payload(Bytes::from(vec![1u8; 1200]), 500).collect();
        let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![500, 500, 200]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        assert_eq!(split_payload(Bytes::from(vec![0u8; 1000]), 500).count(), 2);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert_eq!(split_payload(Bytes::new(), 500).count(), 0);
    }

    #[test]
    fn chunks_concatenate_back_to_the_input() {
        let data: Vec<u8> = (0..=255u8).cycle().take(777).collect();
        let joined: Vec<u8> = split_payload(Bytes::from(data.clone()), 100)
            .flat_map(|chunk| chunk.to_vec())
            .collect();
        assert_eq!(joined, data);
    }
}
