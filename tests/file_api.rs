// File-level driver coverage: naming, overwrite policy, directory
// expansion, and end-to-end file round trips.

mod common;

use std::fs;

use common::sample_text;
use knz::io::prefs::Prefs;
use knz::io::{compress_file, decompress_file, expand_inputs, run};
use tempfile::TempDir;

fn prefs(level_transform: &str, entropy: &str) -> Prefs {
    let mut p = Prefs::default();
    p.config = common::config(level_transform, entropy, 65536, 2, true);
    p
}

#[test]
fn file_round_trip_with_default_naming() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("corpus.txt");
    let data = sample_text(150_000);
    fs::write(&input, &data).unwrap();

    let p = prefs("DNA+LZ", "HUFFMAN");
    compress_file(&p, input.to_str().unwrap(), None).unwrap();
    let compressed = dir.path().join("corpus.txt.knz");
    assert!(compressed.exists());
    assert!(fs::metadata(&compressed).unwrap().len() < data.len() as u64);

    fs::remove_file(&input).unwrap();
    decompress_file(&p, compressed.to_str().unwrap(), None).unwrap();
    assert_eq!(fs::read(&input).unwrap(), data);
}

#[test]
fn overwrite_requires_force() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("a.bin");
    fs::write(&input, sample_text(5000)).unwrap();
    let p = prefs("LZ", "HUFFMAN");
    compress_file(&p, input.to_str().unwrap(), None).unwrap();
    // Second run against the existing .knz must fail without --force.
    let err = compress_file(&p, input.to_str().unwrap(), None).unwrap_err();
    assert_eq!(err.exit_code(), -11);
    let mut forced = prefs("LZ", "HUFFMAN");
    forced.force = true;
    compress_file(&forced, input.to_str().unwrap(), None).unwrap();
}

#[test]
fn remove_input_after_success() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("gone.bin");
    fs::write(&input, sample_text(20_000)).unwrap();
    let mut p = prefs("LZ", "HUFFMAN");
    p.remove_input = true;
    compress_file(&p, input.to_str().unwrap(), None).unwrap();
    assert!(!input.exists());
    assert!(dir.path().join("gone.bin.knz").exists());
}

#[test]
fn directory_expansion_filters_dot_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.txt"), b"1").unwrap();
    fs::write(dir.path().join("two.txt"), b"2").unwrap();
    fs::write(dir.path().join(".hidden"), b"3").unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("three.txt"), b"4").unwrap();

    let mut p = prefs("NONE", "NONE");
    p.no_dot_file = true;
    let files = expand_inputs(&p, dir.path().to_str().unwrap()).unwrap();
    assert_eq!(files.len(), 3, "{:?}", files);
    assert!(files.iter().all(|f| !f.contains(".hidden")));

    p.no_dot_file = false;
    let all = expand_inputs(&p, dir.path().to_str().unwrap()).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn run_compresses_a_whole_directory() {
    let dir = TempDir::new().unwrap();
    for name in ["x.dat", "y.dat"] {
        fs::write(dir.path().join(name), sample_text(30_000)).unwrap();
    }
    let p = prefs("LZ", "HUFFMAN");
    run(&p, true, dir.path().to_str().unwrap(), None).unwrap();
    assert!(dir.path().join("x.dat.knz").exists());
    assert!(dir.path().join("y.dat.knz").exists());
}

#[test]
fn decompress_rejects_foreign_extension_without_output() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("not-compressed.bin");
    fs::write(&bogus, b"data").unwrap();
    let p = prefs("NONE", "NONE");
    assert!(decompress_file(&p, bogus.to_str().unwrap(), None).is_err());
}
