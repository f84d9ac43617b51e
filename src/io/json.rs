//! Self-describing JSON instance format: the canonical `serde_json` serialization of
//! [`Instance`].

use std::io::{Read, Write};

use super::Instance;

pub fn read<R: Read>(reader: R) -> Result<Instance, String> {
    serde_json::from_reader(reader).map_err(|e| e.to_string())
}

pub fn write<W: Write>(writer: W, instance: &Instance) -> Result<(), String> {
    serde_json::to_writer_pretty(writer, instance).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let instance = Instance {
            weights: vec![vec![0.0, 2.0], vec![2.0, 0.0]],
            start: vec![0],
            end: vec![1],
        };
        let mut buffer = Vec::new();
        write(&mut buffer, &instance).unwrap();
        let parsed = read(&buffer[..]).unwrap();
        assert_eq!(parsed.weights, instance.weights);
        assert_eq!(parsed.start, instance.start);
        assert_eq!(parsed.end, instance.end);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(read("{not json".as_bytes()).is_err());
    }
}
