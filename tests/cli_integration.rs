use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use wallgallery::codec;

fn wallgallery() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wallgallery"));
    cmd.env_remove("WALLGALLERY_RPC_URL")
        .env_remove("WALLGALLERY_RPC_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn item(id: &str, category: &str, size: u64, date: &str) -> Value {
    json!({
        "id": id,
        "filename": format!("{}--{}.jpg", category, id),
        "category": category,
        "path": format!("/wallpaper/desktop/{}.jpg", id),
        "thumbnailPath": format!("/thumbnail/desktop/{}.webp", id),
        "size": size,
        "format": "JPG",
        "createdAt": format!("{}T00:00:00Z", date),
        "resolution": { "width": 3840, "height": 2160 },
        "tags": [],
    })
}

/// A local mirror with one two-category desktop series, plus a config file
/// pointing at it. Returns the config path.
fn write_fixture(root: &Path) -> std::path::PathBuf {
    let series_dir = root.join("data").join("desktop");
    std::fs::create_dir_all(&series_dir).unwrap();

    let categories = json!([
        { "name": "landscape", "file": "landscape.json", "count": 2 },
        { "name": "anime", "file": "anime.json", "count": 1 },
    ]);
    let index = json!({
        "series": "desktop",
        "total": 3,
        "categoryCount": 2,
        "blob": codec::encode(&categories.to_string()),
    });
    std::fs::write(series_dir.join("index.json"), index.to_string()).unwrap();

    let landscape = json!([
        item("lake", "landscape", 2_000_000, "2024-03-01"),
        item("peak", "landscape", 5_000_000, "2024-05-01"),
    ]);
    std::fs::write(
        series_dir.join("landscape.json"),
        json!({ "blob": codec::encode(&landscape.to_string()) }).to_string(),
    )
    .unwrap();

    // Unencoded category files are accepted too.
    let anime = json!({ "wallpapers": [item("sakura", "anime", 1_000_000, "2024-04-01")] });
    std::fs::write(series_dir.join("anime.json"), anime.to_string()).unwrap();

    let config = format!(
        "[catalog]\ndata_source = \"{}\"\ncdn_base = \"https://cdn.test/gh/owner/pics\"\ndefault_cdn_tag = \"v1\"\n\n[storage]\nstate_dir = \"{}\"\n",
        root.join("data").display().to_string().replace('\\', "/"),
        root.join("state").display().to_string().replace('\\', "/"),
    );
    let config_path = root.join("config.toml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}

fn run_with_config(config: &Path, args: &[&str]) -> Output {
    wallgallery()
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run")
}

#[test]
fn test_help_exits_zero() {
    let output = wallgallery().arg("--help").output().expect("failed to run");
    assert!(output.status.success(), "wallgallery --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Wallpaper catalog browser"),
        "help should contain description"
    );
}

#[test]
fn test_version_exits_zero() {
    let output = wallgallery()
        .arg("--version")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("wallgallery"));
}

#[test]
fn test_series_lists_builtin_series() {
    let output = wallgallery().arg("series").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("desktop"));
    assert!(stdout.contains("bing"));
}

#[test]
fn test_encode_then_decode_through_stdin() {
    let mut encode = wallgallery()
        .arg("encode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run");
    encode
        .stdin
        .take()
        .unwrap()
        .write_all("[{\"name\":\"风景\"}]\n".as_bytes())
        .unwrap();
    let encoded = encode.wait_with_output().unwrap();
    assert!(encoded.status.success());
    let blob = String::from_utf8(encoded.stdout).unwrap();
    assert!(blob.starts_with(codec::VERSION_PREFIX));

    let mut decode = wallgallery()
        .arg("decode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run");
    decode
        .stdin
        .take()
        .unwrap()
        .write_all(blob.as_bytes())
        .unwrap();
    let decoded = decode.wait_with_output().unwrap();
    assert!(decoded.status.success());
    assert_eq!(
        String::from_utf8(decoded.stdout).unwrap().trim_end(),
        "[{\"name\":\"风景\"}]"
    );
}

#[test]
fn test_decode_rejects_garbage() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("blob.txt");
    std::fs::write(&file, "not a blob").unwrap();

    let output = wallgallery()
        .arg("decode")
        .arg(&file)
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"));
}

#[test]
fn test_list_from_local_mirror() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_fixture(tmp.path());

    let output = run_with_config(&config, &["list", "--series", "desktop"]);
    assert!(
        output.status.success(),
        "list failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let peak = stdout.find("peak").unwrap();
    let sakura = stdout.find("sakura").unwrap();
    let lake = stdout.find("lake").unwrap();
    assert!(peak < sakura && sakura < lake, "newest first:\n{}", stdout);
    assert!(stdout.contains("3 of 3 wallpapers in desktop"));
}

#[test]
fn test_list_filters_and_json() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_fixture(tmp.path());

    let output = run_with_config(
        &config,
        &[
            "list",
            "--series",
            "desktop",
            "--category",
            "landscape",
            "--sort",
            "smallest",
            "--json",
        ],
    );
    assert!(output.status.success());
    let items: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["lake", "peak"]);
    assert_eq!(
        items[0]["url"],
        "https://cdn.test/gh/owner/pics@v1/wallpaper/desktop/lake.jpg"
    );

    let output = run_with_config(&config, &["list", "--series", "desktop", "-q", "SAKURA"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 of 1 wallpapers"));
}

#[test]
fn test_categories_and_show() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_fixture(tmp.path());

    let output = run_with_config(&config, &["categories", "--series", "desktop"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("All categories"));
    assert!(stdout.find("landscape").unwrap() < stdout.find("anime").unwrap());

    let output = run_with_config(&config, &["show", "sakura", "--series", "desktop"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3840x2160"));
    assert!(stdout.contains("prev:        peak"));

    let output = run_with_config(&config, &["show", "missing", "--series", "desktop"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No wallpaper with id missing"));
}

#[test]
fn test_unknown_series_fails_gracefully() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_fixture(tmp.path());

    let output = run_with_config(&config, &["list", "--series", "nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"));
    assert!(stderr.contains("nope"));
}

#[test]
fn test_cache_clear() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_fixture(tmp.path());

    let output = run_with_config(&config, &["cache", "clear"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Removed 0 cached stats file(s)"));
}
