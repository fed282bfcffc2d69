//! Mock construction helpers

/// Sample lines where channel `c` of sample `i` reads `i + c / 10`
pub fn ramp_lines(count: usize, channels: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            (0..channels)
                .map(|c| format!("{}", i as f64 + c as f64 / 10.0))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect()
}

/// A complete burst frame around `lines`
pub fn frame(lines: &[String]) -> Vec<String> {
    let mut framed = Vec::with_capacity(lines.len() + 2);
    framed.push("start".to_string());
    framed.extend(lines.iter().cloned());
    framed.push("stop".to_string());
    framed
}
