use std::process::Command;
use vieneu::audio::io::WavIo;

#[test]
fn cli_lists_models() {
    let output = Command::new(env!("CARGO_BIN_EXE_vieneu"))
        .args(["models"])
        .output()
        .expect("run vieneu models");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pnnbao-ump/VieNeu-TTS"));
    assert!(stdout.contains("neuphonic/neucodec-onnx-decoder"));
}

#[test]
fn cli_normalizes_text() {
    let output = Command::new(env!("CARGO_BIN_EXE_vieneu"))
        .args(["normalize", "Năm 2024 có 12 tháng."])
        .output()
        .expect("run vieneu normalize");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        "năm hai nghìn không trăm hai mươi bốn có mười hai tháng."
    );
}

#[test]
fn cli_converts_audio() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    let stereo = vec![vec![0.25_f32; 16_000], vec![-0.25_f32; 16_000]];
    WavIo::write_wav(&input, &stereo, 16_000).expect("write input");

    let status = Command::new(env!("CARGO_BIN_EXE_vieneu"))
        .args([
            "audio",
            "convert",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--to-rate",
            "24000",
            "--to-channels",
            "1",
        ])
        .status()
        .expect("run vieneu audio convert");
    assert!(status.success());

    let (decoded, sample_rate) = WavIo::read_wav(&output).expect("read output");
    assert_eq!(sample_rate, 24_000);
    assert_eq!(decoded.len(), 1);
    assert!(decoded[0].len() > 20_000);
}

#[test]
fn cli_rejects_missing_config() {
    let output = Command::new(env!("CARGO_BIN_EXE_vieneu"))
        .args(["download", "--config", "does/not/exist.yaml"])
        .output()
        .expect("run vieneu download");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"), "{stderr}");
}

#[test]
fn cli_say_rejects_audio_reference_without_encoder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_vieneu"))
        .current_dir(dir.path())
        .args([
            "say",
            "xin chào",
            "--ref-audio",
            "voice.wav",
            "--ref-text",
            "giọng mẫu",
            "--backbone-device",
            "cpu",
            "--codec-device",
            "cpu",
        ])
        .output()
        .expect("run vieneu say");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("codec.encoder_file"), "{stderr}");
    assert!(!dir.path().join("output.wav").exists());
}
