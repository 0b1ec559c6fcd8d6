use CHART_WELL::{
    LibraryStats, MalodyImporter, MalodyOptions, SIMFILE_NAME, assemble_pack, build_library,
    write_simfile,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

const SUNRISE_4K: &str = r#"{
    "meta": {
        "$ver": 0,
        "creator": "alice",
        "background": "bg.png",
        "version": "4K Lv.8",
        "id": 5001,
        "mode": 0,
        "time": 1700000000,
        "song": { "title": "Sunrise", "artist": "Band", "id": 100 },
        "mode_ext": { "column": 4, "bar_begin": 0 }
    },
    "time": [
        { "beat": [0, 0, 1], "bpm": 120 },
        { "beat": [8, 0, 1], "bpm": 240 }
    ],
    "note": [
        { "beat": [0, 0, 1], "column": 0 },
        { "beat": [2, 0, 1], "column": 1 },
        { "beat": [4, 0, 1], "endbeat": [5, 0, 1], "column": 2 },
        { "beat": [0, 0, 1], "sound": "audio.mp3", "vol": 100, "offset": -100, "type": 1 }
    ]
}"#;

const SUNRISE_7K: &str = r#"{
    "meta": {
        "creator": "bob",
        "background": "other.png",
        "version": "7K Another",
        "mode": 0,
        "song": { "title": "Sunrise", "artist": "Band", "id": 100 },
        "mode_ext": { "column": 7 }
    },
    "time": [
        { "beat": [0, 0, 1], "bpm": 120 },
        { "beat": [8, 0, 1], "bpm": 240 }
    ],
    "note": [
        { "beat": [1, 1, 3], "column": 6 },
        { "beat": [0, 0, 1], "sound": "audio.mp3", "offset": -100 }
    ]
}"#;

const TRANSLIT: &str = r#"{
    "meta": {
        "creator": "carol",
        "version": "Normal",
        "mode": 0,
        "song": { "title": "Yoake", "artist": "Gakudan", "titleorg": "夜明け", "artistorg": "楽団", "id": 200 },
        "mode_ext": { "column": 6 }
    },
    "time": [ { "beat": [0, 0, 1], "bpm": 150 } ],
    "note": []
}"#;

const CATCH_MODE: &str = r#"{
    "meta": {
        "version": "Catch",
        "mode": 3,
        "song": { "title": "Falling", "artist": "Band", "id": 300 },
        "mode_ext": { "column": 4 }
    },
    "time": [ { "beat": [0, 0, 1], "bpm": 100 } ],
    "note": []
}"#;

fn put(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn malody_library(root: &Path) {
    put(root, "_song_100/0/1700000000.mc", SUNRISE_4K);
    put(root, "_song_100/0/audio.mp3", "mp3");
    put(root, "_song_100/0/bg.png", "png");
    put(root, "_song_100/1/1700000001.mc", SUNRISE_7K);
    put(root, "_song_200/0/chart.mc", TRANSLIT);
    put(root, "_song_300/0/chart.mc", CATCH_MODE);
}

#[test]
fn malody_library_to_simfile_text() {
    env_logger::try_init().unwrap_or(());

    let input = tempfile::tempdir().unwrap();
    malody_library(input.path());

    let importer = MalodyImporter::new(MalodyOptions {
        verify: true,
        keymode_filter: None,
    });
    let (library, imported) = build_library(input.path(), None, &importer).unwrap();
    assert_eq!(imported.added, 3);
    assert_eq!(imported.filtered, 1);
    assert_eq!(imported.failed, 0);

    let built = library.build();
    assert!(built.failures.is_empty());

    let stats = LibraryStats::of(&built.songs);
    assert_eq!(stats.to_string(), "2 songs, 3 charts\n4k: 1, 6k: 1, 7k: 1");

    let sunrise = built.songs.iter().find(|s| s.title == "Sunrise").unwrap();
    let simfile = write_simfile(sunrise).unwrap();
    assert!(simfile.skipped.is_empty());

    let expected_head = "#TITLE:Sunrise;\n\
                         #ARTIST:Band;\n\
                         #MUSIC:audio.mp3;\n\
                         #OFFSET:-0.1;\n\
                         #CREDIT:alice, bob;\n\
                         #BACKGROUND:bg.png;\n\
                         #BANNER:bg.png;\n\
                         #BPMS:0=120,\n8=240;\n";
    assert!(simfile.text.starts_with(expected_head), "{}", simfile.text);

    let four_key = "\n// Chart by \"alice\"\n\
                    //---------------dance-single - 4K Lv.8----------------\n\
                    #NOTES:\n     dance-single:\n     4K Lv.8:\n     Edit:\n     8:\n     0,0,0,0,0:\n\
                    1000\n0000\n0100\n0000\n,\n0020\n0030\n0000\n0000\n;\n";
    assert!(simfile.text.contains(four_key), "{}", simfile.text);

    // a third of the way into the bar, on a 6-row grid
    let seven_key = "     kb7-single:\n     7K Another:\n     Edit:\n     1:\n     0,0,0,0,0:\n\
                     0000000\n0000000\n0000001\n0000000\n0000000\n0000000\n;\n";
    assert!(simfile.text.contains(seven_key), "{}", simfile.text);

    let yoake = built.songs.iter().find(|s| s.source_id == Some(200)).unwrap();
    let text = write_simfile(yoake).unwrap().text;
    assert!(text.starts_with(
        "#TITLE:夜明け;\n#TITLETRANSLIT:Yoake;\n#ARTIST:楽団;\n#ARTISTTRANSLIT:Gakudan;\n"
    ));
    assert!(text.contains("     dance-solo:\n"));
    assert!(text.contains("000000\n000000\n000000\n000000\n;\n"));
}

#[test]
fn malody_library_to_song_pack() {
    env_logger::try_init().unwrap_or(());

    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    malody_library(input.path());

    let importer = MalodyImporter::new(MalodyOptions {
        verify: false,
        keymode_filter: Some(4),
    });
    let (library, _) = build_library(input.path(), None, &importer).unwrap();
    let songs = library.build().songs;
    assert_eq!(songs.len(), 1);

    let summary = assemble_pack(&songs, output.path(), &AtomicBool::new(false)).unwrap();
    assert_eq!(summary.written, 1);
    assert_eq!(summary.failed, 0);

    let song_dir = output.path().join("Sunrise [100]");
    for file in ["audio.mp3", "bg.png", "1700000000.mc.old", SIMFILE_NAME] {
        assert!(song_dir.join(file).is_file(), "missing {}", file);
    }

    let text = fs::read_to_string(song_dir.join(SIMFILE_NAME)).unwrap();
    assert_eq!(text.matches("#NOTES:").count(), 1);
    assert!(text.contains("#CREDIT:alice;\n"));
}
