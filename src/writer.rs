use crate::engine::{BarGrid, resync_tempo};
use crate::error::{ChartError, ChartResult};
use crate::model::song::{Chart, Note, Song, TempoPoint};
use crate::util::escape_field;
use log::{debug, warn};
use std::collections::BTreeMap;

const BAR_SEPARATOR: &str = "\n,\n";
const DEFAULT_DIFFICULTY: u32 = 1;

/// Bars a single chart may span, about eleven hours at 60 bpm.
pub const MAX_CHART_BARS: i64 = 10_000;

/// Simfile chart types per column count. Some column counts are written once per type.
pub fn chart_type_strings(num_columns: usize) -> ChartResult<&'static [&'static str]> {
    let types: &'static [&'static str] = match num_columns {
        4 => &["dance-single"],
        5 => &["pump-single"],
        6 => &["dance-solo"],
        7 => &["kb7-single"],
        8 => &["dance-double", "bm-single7"],
        9 => &["pnm-nine"],
        10 => &["pump-double"],
        other => return Err(ChartError::UnknownColumnCount(other)),
    };

    Ok(types)
}

/// Renders every bar from 0 to the last populated one, separated by `,` lines.
///
/// ```text
/// 1000
/// 0000
/// 0100
/// 0000
/// ,
/// 0000
/// ...
/// ```
///
/// Bars without notes, and a chart without any notes at all, render as four empty rows.
/// A note at or past [`MAX_CHART_BARS`] makes the chart `ChartTooLong`.
pub fn note_grid_text(notes: &[Note], num_columns: usize) -> ChartResult<String> {
    let mut bars: BTreeMap<i64, Vec<&Note>> = BTreeMap::new();
    let mut before_start = 0usize;

    for note in notes {
        if note.time.bar() < 0 {
            before_start += 1;
            continue;
        }
        bars.entry(note.time.bar()).or_default().push(note);
    }

    if before_start > 0 {
        warn!("Dropping {} note(s) placed before the first bar..!", before_start);
    }

    let last_bar = bars.keys().next_back().copied().unwrap_or(0);
    if last_bar >= MAX_CHART_BARS {
        return Err(ChartError::ChartTooLong {
            last_bar,
            max_bars: MAX_CHART_BARS,
        });
    }

    let text = (0..=last_bar)
        .map(|bar| match bars.get(&bar) {
            Some(bar_notes) => BarGrid::from_notes(bar_notes, num_columns),
            None => BarGrid::empty(num_columns),
        })
        .map(|grid| grid.render())
        .collect::<Vec<_>>()
        .join(BAR_SEPARATOR);

    Ok(text)
}

/// `beat=bpm` pairs for the `#BPMS` tag. Expects a timeline already resynced.
pub fn tempo_text(points: &[TempoPoint]) -> String {
    points
        .iter()
        .map(|point| format!("{}={}", point.time.absolute_beat(), point.bpm))
        .collect::<Vec<_>>()
        .join(",\n")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedChart {
    pub label: String,
    pub error: ChartError,
}

/// A rendered simfile plus the charts that could not be written into it.
#[derive(Debug, Clone)]
pub struct Simfile {
    pub text: String,
    pub skipped: Vec<SkippedChart>,
}

/// Serializes a whole song. The tempo timeline is resynced once for all charts.
///
/// A chart that cannot be expressed is left out and listed in [`Simfile::skipped`];
/// a timeline that cannot be resynced fails the whole song.
pub fn write_simfile(song: &Song) -> ChartResult<Simfile> {
    let tempo = resync_tempo(song.tempo())?;
    let mut text = String::new();

    let creators = song
        .creators()
        .into_iter()
        .map(escape_field)
        .collect::<Vec<_>>()
        .join(", ");
    let background = song.background();

    push_tag(&mut text, "TITLE", Some(song.title.as_str()));
    push_tag(&mut text, "TITLETRANSLIT", song.title_translit.as_deref());
    push_tag(&mut text, "ARTIST", Some(song.artist.as_str()));
    push_tag(&mut text, "ARTISTTRANSLIT", song.artist_translit.as_deref());
    push_tag(&mut text, "MUSIC", song.audio.as_deref());
    push_raw_tag(&mut text, "OFFSET", song.offset.map(|o| o.to_string()));
    push_raw_tag(
        &mut text,
        "CREDIT",
        (!creators.is_empty()).then_some(creators),
    );
    push_tag(&mut text, "BACKGROUND", background);
    push_tag(&mut text, "BANNER", background);
    push_raw_tag(&mut text, "BPMS", Some(tempo_text(&tempo)));

    let mut skipped = Vec::new();
    for chart in song.charts() {
        match chart_section(chart) {
            Ok(section) => text.push_str(&section),
            Err(error) => {
                warn!(
                    "Skipping chart '{}' of '{}': {}",
                    chart.label, song.title, error
                );
                skipped.push(SkippedChart {
                    label: chart.label.clone(),
                    error,
                });
            }
        }
    }

    Ok(Simfile { text, skipped })
}

fn chart_section(chart: &Chart) -> ChartResult<String> {
    let types = chart_type_strings(chart.num_columns)?;
    let notes = note_grid_text(chart.notes(), chart.num_columns)?;
    let label = escape_field(&chart.label);
    let difficulty = chart.difficulty.unwrap_or(DEFAULT_DIFFICULTY);

    debug!(
        "Writing chart '{}' ({} notes) as {}",
        chart.label,
        chart.notes().len(),
        types.join(" + ")
    );

    let mut out = String::new();
    for type_string in types {
        out.push('\n');
        if let Some(creator) = &chart.creator {
            out.push_str(&format!("// Chart by \"{}\"\n", escape_field(creator)));
        }
        out.push_str(&format!(
            "//---------------{} - {}----------------\n",
            type_string, label
        ));
        out.push_str(&format!(
            "#NOTES:\n     {}:\n     {}:\n     Edit:\n     {}:\n     0,0,0,0,0:\n{}\n;\n",
            type_string, label, difficulty, notes
        ));
    }

    Ok(out)
}

fn push_tag(out: &mut String, name: &str, value: Option<&str>) {
    push_raw_tag(out, name, value.map(escape_field));
}

fn push_raw_tag(out: &mut String, name: &str, value: Option<String>) {
    if let Some(value) = value {
        out.push_str(&format!("#{}:{};\n", name, value));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::song::{ChartBuilder, NoteKind, SongBuilder};
    use crate::model::time::RowTime;

    fn at(bar: i64, beat: i64, snap: i64) -> RowTime {
        RowTime::new(bar, beat, snap).unwrap()
    }

    fn tap(column: usize, time: RowTime) -> Note {
        Note::new(column, time, NoteKind::Tap)
    }

    fn song_with(charts: Vec<Chart>, tempo: Vec<TempoPoint>) -> Song {
        let mut builder = SongBuilder::new();
        builder.title = Some("Title".into());
        builder.artist = Some("Artist".into());
        builder.set_tempo(tempo);
        for chart in charts {
            builder.add_chart(chart);
        }
        builder.build().unwrap()
    }

    fn chart(num_columns: usize, label: &str, notes: &[Note]) -> Chart {
        let mut builder = ChartBuilder::new(num_columns).label(label);
        for note in notes {
            builder.push_note(*note).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn two_taps_in_one_bar() {
        let notes = [tap(0, at(0, 0, 4)), tap(1, at(0, 2, 4))];
        assert_eq!(note_grid_text(&notes, 4).unwrap(), "1000\n0000\n0100\n0000");
    }

    #[test]
    fn empty_chart_is_one_filler_bar() {
        assert_eq!(note_grid_text(&[], 4).unwrap(), "0000\n0000\n0000\n0000");
        assert_eq!(note_grid_text(&[], 7).unwrap(), "0000000\n0000000\n0000000\n0000000");
    }

    #[test]
    fn gaps_are_filled_and_no_trailing_separator() {
        let notes = [tap(0, at(0, 0, 4)), tap(3, at(2, 1, 8))];
        let text = note_grid_text(&notes, 4).unwrap();
        let bars: Vec<&str> = text.split(BAR_SEPARATOR).collect();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[1], "0000\n0000\n0000\n0000");
        assert_eq!(bars[2], "0000\n0001\n0000\n0000\n0000\n0000\n0000\n0000");
        assert!(!text.ends_with(','));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn notes_before_the_first_bar_are_dropped() {
        env_logger::try_init().unwrap_or(());

        let notes = [tap(0, at(-1, 3, 4)), tap(1, at(0, 0, 4))];
        assert_eq!(note_grid_text(&notes, 4).unwrap(), "0100\n0000\n0000\n0000");
    }

    #[test]
    fn tempo_is_written_in_beats() {
        let tempo = [
            TempoPoint::new(at(0, 0, 4), 120.0),
            TempoPoint::new(at(2, 1, 4), 145.5),
        ];
        assert_eq!(tempo_text(&tempo), "0=120,\n9=145.5");
    }

    #[test]
    fn chart_types() {
        assert_eq!(chart_type_strings(4).unwrap(), &["dance-single"]);
        assert_eq!(chart_type_strings(8).unwrap(), &["dance-double", "bm-single7"]);
        assert_eq!(chart_type_strings(3), Err(ChartError::UnknownColumnCount(3)));
        assert_eq!(chart_type_strings(11), Err(ChartError::UnknownColumnCount(11)));
    }

    #[test]
    fn full_simfile() {
        let notes = [tap(0, at(0, 0, 4)), tap(1, at(0, 2, 4))];
        let mut song = song_with(
            vec![chart(4, "4K Hard", &notes)],
            vec![TempoPoint::new(at(0, 0, 4), 120.0)],
        );
        song.audio = Some("song.ogg".into());
        song.offset = Some(0.25);

        let simfile = write_simfile(&song).unwrap();
        assert!(simfile.skipped.is_empty());
        assert_eq!(
            simfile.text,
            "#TITLE:Title;\n\
             #ARTIST:Artist;\n\
             #MUSIC:song.ogg;\n\
             #OFFSET:0.25;\n\
             #BPMS:0=120;\n\
             \n\
             //---------------dance-single - 4K Hard----------------\n\
             #NOTES:\n     dance-single:\n     4K Hard:\n     Edit:\n     1:\n     0,0,0,0,0:\n\
             1000\n0000\n0100\n0000\n;\n"
        );
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let mut song = song_with(vec![], vec![TempoPoint::new(at(0, 0, 4), 120.0)]);
        song.title = "Re:Start; Again".into();

        let text = write_simfile(&song).unwrap().text;
        let title_line = text.lines().next().unwrap();
        assert_eq!(title_line, "#TITLE:Re Start  Again;");
        assert_eq!(title_line.matches(':').count(), 1);
        assert_eq!(title_line.matches(';').count(), 1);
    }

    #[test]
    fn unknown_column_count_skips_only_that_chart() {
        env_logger::try_init().unwrap_or(());

        let song = song_with(
            vec![chart(3, "3K", &[]), chart(8, "8K", &[])],
            vec![TempoPoint::new(at(0, 0, 4), 120.0)],
        );

        let simfile = write_simfile(&song).unwrap();
        assert_eq!(
            simfile.skipped,
            vec![SkippedChart {
                label: "3K".into(),
                error: ChartError::UnknownColumnCount(3)
            }]
        );
        assert_eq!(simfile.text.matches("#NOTES:").count(), 2);
        assert!(simfile.text.contains("     dance-double:\n"));
        assert!(simfile.text.contains("     bm-single7:\n"));
    }

    #[test]
    fn far_away_notes_skip_only_that_chart() {
        env_logger::try_init().unwrap_or(());

        let far = [tap(0, at(1_000_000_000_000, 0, 4))];
        assert_eq!(
            note_grid_text(&far, 4),
            Err(ChartError::ChartTooLong {
                last_bar: 1_000_000_000_000,
                max_bars: MAX_CHART_BARS
            })
        );

        let last = [tap(0, at(MAX_CHART_BARS - 1, 0, 4))];
        let text = note_grid_text(&last, 4).unwrap();
        assert_eq!(text.matches(',').count(), (MAX_CHART_BARS - 1) as usize);

        let song = song_with(
            vec![chart(4, "Far", &far), chart(4, "Near", &[tap(1, at(0, 0, 4))])],
            vec![TempoPoint::new(at(0, 0, 4), 120.0)],
        );
        let simfile = write_simfile(&song).unwrap();
        assert_eq!(simfile.skipped.len(), 1);
        assert_eq!(simfile.skipped[0].label, "Far");
        assert_eq!(simfile.text.matches("#NOTES:").count(), 1);
        assert!(simfile.text.contains("0100\n0000\n0000\n0000\n;\n"));
    }

    #[test]
    fn tempo_is_resynced_before_writing() {
        let song = song_with(
            vec![],
            vec![
                TempoPoint::new(at(0, 0, 4), 120.0),
                TempoPoint::new(at(1, 3, 1000), 150.0),
                TempoPoint::new(at(2, 0, 4), 90.0),
            ],
        );

        let text = write_simfile(&song).unwrap().text;
        let bpms = text.lines().find(|l| l.starts_with("#BPMS:")).unwrap();
        assert!(bpms.starts_with("#BPMS:0="));
        assert!(text.contains(&format!(",\n{}=", at(1, 1, 192).absolute_beat())));
        assert!(text.contains(",\n8=90;"));
    }

    #[test]
    fn broken_timeline_fails_the_song() {
        let song = song_with(
            vec![],
            vec![
                TempoPoint::new(at(0, 0, 4), 120.0),
                TempoPoint::new(at(0, 1, 1000), 150.0),
            ],
        );

        assert!(matches!(
            write_simfile(&song),
            Err(ChartError::TempoOrderingViolation { .. })
        ));
    }

    #[test]
    fn credits_and_background() {
        let mut builder = SongBuilder::new();
        builder.title = Some("Title".into());
        builder.artist = Some("Artist".into());
        builder.set_tempo(vec![TempoPoint::new(at(0, 0, 4), 120.0)]);
        builder.add_chart(
            ChartBuilder::new(4)
                .label("Easy")
                .creator(Some("mapper:one".into()))
                .background(Some("bg.png".into()))
                .build()
                .unwrap(),
        );
        let text = write_simfile(&builder.build().unwrap()).unwrap().text;

        assert!(text.contains("#CREDIT:mapper one;\n"));
        assert!(text.contains("#BACKGROUND:bg.png;\n#BANNER:bg.png;\n"));
        assert!(text.contains("// Chart by \"mapper one\"\n"));
    }
}
