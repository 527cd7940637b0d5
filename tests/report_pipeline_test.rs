//! End-to-end tests from local beatmap files and hit counts to a report.

use anyhow::Result;
use osu_accuracy::beatmap_meta::{local_beatmap_path, read_beatmap_lines, read_metadata};
use osu_accuracy::osu_stream_splitter::{split_all, SplitterConfig};
use osu_accuracy::{AccuracyCaches, AccuracyConfig, AccuracyReport, HitCounts, Play};
use tempfile::TempDir;

fn beatmap(title: &str, version: &str, objects: usize) -> String {
    let mut text = String::from("osu file format v14\r\n\r\n[General]\r\n");
    while text.len() < 300 {
        text.push_str("PreviewTime: 12345\r\n");
    }
    text.push_str(&format!(
        "\r\n[Metadata]\r\nTitle:{title}\r\nArtist:Camellia\r\nCreator:Mir\r\nVersion:{version}\r\nBeatmapID:2000001\r\nBeatmapSetID:900001\r\n\r\n[HitObjects]\r\n"
    ));
    for i in 0..objects {
        text.push_str(&format!("{},{},{},1,0,0:0:0:0:\r\n", i % 512, i % 384, i * 100));
    }
    text
}

/// Deterministic chunk boundaries so failures reproduce.
fn chunk_sizes(seed: u64, len: usize) -> Vec<usize> {
    let mut state = seed;
    let mut sizes = Vec::new();
    let mut total = 0;
    while total < len {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let size = ((state >> 33) % 97 + 1) as usize;
        sizes.push(size.min(len - total));
        total += size;
    }
    sizes
}

#[test]
fn test_line_split_is_independent_of_chunking() -> Result<()> {
    let text = beatmap("Ghost", "Extra", 400);
    let bytes = text.as_bytes();
    let reference = split_all(SplitterConfig::new(b"\r\n".to_vec()), [bytes])?;
    let mut expected: Vec<&[u8]> = text.split("\r\n").map(str::as_bytes).collect();
    // The trailing separator closes the last line without opening a new one.
    expected.pop();
    assert_eq!(reference, expected);

    for seed in 1..=25u64 {
        let mut chunks = Vec::new();
        let mut rest = bytes;
        for size in chunk_sizes(seed, bytes.len()) {
            let (head, tail) = rest.split_at(size);
            chunks.push(head);
            rest = tail;
        }
        let config = SplitterConfig::new(b"\r\n".to_vec()).with_buffer_size(8);
        assert_eq!(split_all(config, chunks)?, reference, "seed {}", seed);
    }
    Ok(())
}

#[tokio::test]
async fn test_local_beatmap_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let osu = temp_dir.path().join("osu!");
    let config = AccuracyConfig::new(Some(osu.clone()), temp_dir.path().join("cache"));
    let songs = config.songs_path().expect("songs path");

    let meta_path = {
        let probe = temp_dir.path().join("probe.osu");
        std::fs::write(&probe, beatmap("Ghost", "Extra", 10))?;
        let meta = read_metadata(&probe).await?.expect("metadata");
        assert_eq!(meta.set_id, 900001);
        local_beatmap_path(&songs, &meta)
    };
    assert!(meta_path.starts_with(songs.join("900001 Camellia - Ghost")));
    assert!(meta_path.ends_with("Camellia - Ghost (Mir) [Extra].osu"));

    if let Some(parent) = meta_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&meta_path, beatmap("Ghost", "Extra", 25))?;
    std::fs::write(osu.join("osu!.db"), b"db")?;

    let caches = AccuracyCaches::open(&config).await?;
    assert!(caches.has_local_set(900001));
    let refreshed = caches.refresh_metadata(&config).await?;
    assert_eq!((refreshed.stored, refreshed.failed), (1, 0));
    assert_eq!(caches.local_beatmap(&config, 2000001), Some(meta_path.clone()));

    let lines = read_beatmap_lines(&meta_path, &config).await?;
    let objects = lines
        .iter()
        .skip_while(|line| line.as_str() != "[HitObjects]")
        .skip(1)
        .count();
    assert_eq!(objects, 25);
    caches.flush().await?;
    Ok(())
}

#[test]
fn test_report_from_hit_counts() {
    let plays: Vec<Play> = [
        (412.7, (1480u32, 22u32, 1u32, 0u32)),
        (388.1, (1201, 35, 0, 2)),
        (350.4, (990, 12, 0, 0)),
        (301.9, (870, 5, 0, 0)),
        (280.0, (640, 3, 0, 0)),
        (0.0, (500, 0, 0, 0)),
    ]
    .into_iter()
    .map(|(pp, (count300, count100, count50, count_miss))| {
        Play::from_hits(
            pp,
            &HitCounts {
                count300,
                count100,
                count50,
                count_miss,
            },
        )
    })
    .collect();

    let report = AccuracyReport::from_plays(&plays).expect("report");
    assert_eq!(report.plays, 5);

    let [easy, hard] = report.range;
    assert!(easy > hard, "easier maps should be played more accurately");
    assert!(report.iqr[0] <= report.median && report.median <= report.iqr[1]);
    assert!(report.trend.slope < 0.0);

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["plays"], 5);
}
