//! Plain-text matrix format compatible with the TSPLIB-style fixtures this crate is tested
//! against (`br17.atsp`, `ESC07.sop`): a header line `N A`, `A` lines of `start end` pairs, then
//! `N` rows of `N` whitespace-separated numbers (`-1` preserved literally as the precedence
//! sentinel).

use std::io::{BufRead, BufReader, Read, Write};

use super::Instance;

pub fn read<R: Read>(reader: R) -> Result<Instance, String> {
    let mut lines = BufReader::new(reader).lines();

    let header = lines
        .next()
        .ok_or_else(|| "empty input: expected a header line".to_string())?
        .map_err(|e| e.to_string())?;
    let mut header_fields = header.split_whitespace();
    let n: usize = header_fields
        .next()
        .ok_or_else(|| "missing node count in header".to_string())?
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    let a: usize = header_fields
        .next()
        .ok_or_else(|| "missing agent count in header".to_string())?
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;

    let mut start = Vec::with_capacity(a);
    let mut end = Vec::with_capacity(a);
    for agent in 0..a {
        let line = lines
            .next()
            .ok_or_else(|| format!("missing start/end line for agent {}", agent))?
            .map_err(|e| e.to_string())?;
        let mut fields = line.split_whitespace();
        let s: usize = fields
            .next()
            .ok_or_else(|| format!("missing start node for agent {}", agent))?
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())?;
        let e: usize = fields
            .next()
            .ok_or_else(|| format!("missing end node for agent {}", agent))?
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())?;
        start.push(s);
        end.push(e);
    }

    let mut weights = Vec::with_capacity(n);
    for row_index in 0..n {
        let line = lines
            .next()
            .ok_or_else(|| format!("missing weight row {}", row_index))?
            .map_err(|e| e.to_string())?;
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|token| token.parse::<f64>().map_err(|e| e.to_string()))
            .collect::<Result<_, _>>()?;
        if row.len() != n {
            return Err(format!(
                "row {} has {} columns, expected {}",
                row_index,
                row.len(),
                n
            ));
        }
        weights.push(row);
    }

    Ok(Instance { weights, start, end })
}

pub fn write<W: Write>(mut writer: W, instance: &Instance) -> Result<(), String> {
    let n = instance.num_nodes();
    let a = instance.start.len();
    writeln!(writer, "{} {}", n, a).map_err(|e| e.to_string())?;
    for agent in 0..a {
        writeln!(writer, "{} {}", instance.start[agent], instance.end[agent])
            .map_err(|e| e.to_string())?;
    }
    for row in &instance.weights {
        let rendered: Vec<String> = row.iter().map(|v| format_weight(*v)).collect();
        writeln!(writer, "{}", rendered.join(" ")).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn format_weight(value: f64) -> String {
    if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_instance() {
        let instance = Instance {
            weights: vec![
                vec![0.0, 1.0, -1.0],
                vec![1.0, 0.0, 4.0],
                vec![-1.0, 4.0, 0.0],
            ],
            start: vec![0],
            end: vec![2],
        };

        let mut buffer = Vec::new();
        write(&mut buffer, &instance).unwrap();
        let parsed = read(&buffer[..]).unwrap();

        assert_eq!(parsed.weights, instance.weights);
        assert_eq!(parsed.start, instance.start);
        assert_eq!(parsed.end, instance.end);
    }

    #[test]
    fn rejects_a_short_row() {
        let text = "2 1\n0 1\n0 1\n0\n";
        assert!(read(text.as_bytes()).is_err());
    }

    #[test]
    fn parses_br17_style_header() {
        let text = "3 1\n0 0\n0 1 4\n1 0 1\n4 1 0\n";
        let instance = read(text.as_bytes()).unwrap();
        assert_eq!(instance.num_nodes(), 3);
        assert_eq!(instance.start, vec![0]);
        assert_eq!(instance.end, vec![0]);
    }
}
