use std::path::PathBuf;
use std::process::Command;
use vieneu::audio::io::WavIo;

fn should_run() -> bool {
    std::env::var("VIENEU_E2E").map(|v| v == "1").unwrap_or(false)
}

/// Pre-encoded reference codes, overridable via `VIENEU_REF_AUDIO`.
fn reference_audio() -> PathBuf {
    std::env::var_os("VIENEU_REF_AUDIO")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sample").join("reference.safetensors"))
}

fn run(cmd: &mut Command) {
    let status = cmd.status().expect("run command");
    assert!(status.success());
}

#[test]
fn cli_say_generates_audio() {
    if !should_run() {
        eprintln!("Skipping E2E test; set VIENEU_E2E=1 to enable.");
        return;
    }

    let reference = reference_audio();
    if !reference.exists() {
        eprintln!(
            "Skipping E2E test; {} not found. Create it with `vieneu reference encode` or set VIENEU_REF_AUDIO.",
            reference.display()
        );
        return;
    }

    run(Command::new(env!("CARGO_BIN_EXE_vieneu")).args(["download"]));

    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("say.wav");
    run(Command::new(env!("CARGO_BIN_EXE_vieneu")).args([
        "say",
        "Xin chào, hôm nay là ngày 15/3/2024.",
        "--ref-audio",
        reference.to_str().unwrap(),
        "--ref-text",
        "Đây là giọng nói mẫu.",
        "--output",
        output.to_str().unwrap(),
        "--backbone-device",
        "cpu",
        "--codec-device",
        "cpu",
        "--min-new-tokens",
        "10",
    ]));

    let (decoded, sample_rate) = WavIo::read_wav(&output).expect("read wav");
    assert_eq!(sample_rate, 24000);
    assert!(!decoded.is_empty());
    assert!(!decoded[0].is_empty());
}
