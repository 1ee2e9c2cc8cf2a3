//! Synthetic bextract exports
//!
//! Produces tables with the real layout: 74 header lines (relation on line 2,
//! 68 feature attributes, label declaration on line 71, `@data` on line 74)
//! and a body of one comment line plus one data row. A complete export is
//! well above the 8100-byte validity threshold.

use std::fs;
use std::path::{Path, PathBuf};

/// Feature attributes declared per table
pub const FEATURE_COUNT: usize = 68;

/// Header block of a table exported for `identifier`
pub fn header_block(identifier: &str) -> String {
    let mut header = String::new();
    header.push_str("% Created by Marsyas bextract\n");
    header.push_str(&format!("@relation {}.arff\n", identifier));
    for n in 0..FEATURE_COUNT {
        header.push_str(&format!(
            "@attribute Mean_Acc1000_Mean_Mem20_Spectral_Centroid_Rolloff_Flux_MFCC_{:03}_Power_powerFFT_WinHamming_HopSize512_WinSize512_Sum_AudioCh0 real\n",
            n
        ));
    }
    header.push_str(&format!("@attribute output {{{}_track.wav}}\n", identifier));
    header.push_str("\n\n@data\n");
    header
}

/// Body (comment + data row) for `identifier`
pub fn body(identifier: &str, seed: usize) -> String {
    let values: Vec<String> = (0..FEATURE_COUNT)
        .map(|n| format!("{:.6}", (seed * 31 + n) as f64 / 997.0))
        .collect();
    format!(
        "% {id}_track.wav\n{},{id}_track.wav\n",
        values.join(","),
        id = identifier
    )
}

/// Write a complete export named `<identifier>.mp3.arff`
pub fn write_export(dir: &Path, identifier: &str, seed: usize) -> PathBuf {
    let path = dir.join(format!("{}.mp3.arff", identifier));
    fs::write(&path, format!("{}{}", header_block(identifier), body(identifier, seed))).unwrap();
    path
}

/// Write a truncated export (header cut short, well under 8100 bytes)
pub fn write_truncated_export(dir: &Path, identifier: &str) -> PathBuf {
    let path = dir.join(format!("{}.mp3.arff", identifier));
    let header = header_block(identifier);
    let truncated: String = header.lines().take(5).map(|l| format!("{}\n", l)).collect();
    fs::write(&path, truncated).unwrap();
    path
}

/// Write an export whose header belongs to another track
pub fn write_mismatched_export(dir: &Path, file_identifier: &str, header_identifier: &str) -> PathBuf {
    let path = dir.join(format!("{}.mp3.arff", file_identifier));
    fs::write(
        &path,
        format!("{}{}", header_block(header_identifier), body(header_identifier, 0)),
    )
    .unwrap();
    path
}

/// 12-character identifier for test track `n`
pub fn identifier(n: usize) -> String {
    format!("FRZ0398002{:02}", n)
}
