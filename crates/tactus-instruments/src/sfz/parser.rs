//! SFZ subset parser.
//!
//! Handles the section hierarchy (`<control>`, `<global>`, `<master>`,
//! `<group>`, `<region>`) with opcode inheritance cascading down to each
//! region, `//` comments, and sample paths containing spaces. Unknown
//! opcodes are ignored, as SFZ players conventionally do.

use std::collections::HashMap;

/// How a region's sample repeats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    /// Play once, stop at note-off or sample end.
    NoLoop,
    /// Play once to the end, ignoring note-off.
    OneShot,
    /// Cycle between the loop points until note-off.
    Continuous,
}

/// One region: a sample plus the key/velocity window that triggers it.
#[derive(Clone, Debug)]
pub struct SfzRegion {
    pub sample: String,
    pub lokey: u8,
    pub hikey: u8,
    pub lovel: u8,
    pub hivel: u8,
    pub pitch_keycenter: u8,
    pub transpose: i32,
    pub tune_cents: i32,
    pub volume_db: f32,
    pub loop_mode: LoopMode,
    pub loop_start: Option<u32>,
    pub loop_end: Option<u32>,
}

impl Default for SfzRegion {
    fn default() -> Self {
        Self {
            sample: String::new(),
            lokey: 0,
            hikey: 127,
            lovel: 0,
            hivel: 127,
            pitch_keycenter: 60,
            transpose: 0,
            tune_cents: 0,
            volume_db: 0.0,
            loop_mode: LoopMode::NoLoop,
            loop_start: None,
            loop_end: None,
        }
    }
}

/// A parsed SFZ file: the control-section sample root plus all regions.
#[derive(Clone, Debug, Default)]
pub struct SfzFile {
    pub default_path: Option<String>,
    pub regions: Vec<SfzRegion>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scope {
    None,
    Control,
    Global,
    Master,
    Group,
    Region,
}

type Opcodes = HashMap<String, String>;

pub fn parse_sfz(text: &str) -> SfzFile {
    let mut file = SfzFile::default();
    let mut scope = Scope::None;

    let mut control = Opcodes::new();
    let mut global = Opcodes::new();
    let mut master = Opcodes::new();
    let mut group = Opcodes::new();
    let mut region = Opcodes::new();
    let mut in_region = false;
    // Sample names may contain spaces, so remember where a continuation
    // token should be appended.
    let mut last_key: Option<String> = None;

    for raw_line in text.lines() {
        let line = raw_line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        for token in line.split_whitespace() {
            if token.starts_with('<') {
                if in_region {
                    finish_region(&mut file, &global, &master, &group, &region);
                    region.clear();
                    in_region = false;
                }
                last_key = None;
                scope = match token {
                    "<control>" => Scope::Control,
                    "<global>" => {
                        master.clear();
                        group.clear();
                        Scope::Global
                    }
                    "<master>" => {
                        group.clear();
                        master.clear();
                        Scope::Master
                    }
                    "<group>" => {
                        group.clear();
                        Scope::Group
                    }
                    "<region>" => {
                        in_region = true;
                        Scope::Region
                    }
                    _ => Scope::None,
                };
                continue;
            }

            let target = match scope {
                Scope::Control => &mut control,
                Scope::Global => &mut global,
                Scope::Master => &mut master,
                Scope::Group => &mut group,
                Scope::Region => &mut region,
                Scope::None => continue,
            };

            if let Some((key, value)) = token.split_once('=') {
                let key = key.to_ascii_lowercase();
                target.insert(key.clone(), value.to_string());
                last_key = Some(key);
            } else if let Some(key) = &last_key {
                if let Some(value) = target.get_mut(key) {
                    value.push(' ');
                    value.push_str(token);
                }
            }
        }
    }

    if in_region {
        finish_region(&mut file, &global, &master, &group, &region);
    }

    file.default_path = control.get("default_path").cloned();
    file
}

fn finish_region(
    file: &mut SfzFile,
    global: &Opcodes,
    master: &Opcodes,
    group: &Opcodes,
    region: &Opcodes,
) {
    // Region opcodes win, then group, master, global.
    let lookup = |key: &str| {
        region
            .get(key)
            .or_else(|| group.get(key))
            .or_else(|| master.get(key))
            .or_else(|| global.get(key))
    };

    let Some(sample) = lookup("sample") else {
        return; // a region with no sample cannot sound
    };

    let mut spec = SfzRegion {
        sample: sample.replace('\\', "/"),
        ..SfzRegion::default()
    };

    if let Some(key) = lookup("key").and_then(|v| v.parse::<u8>().ok()) {
        spec.lokey = key;
        spec.hikey = key;
        spec.pitch_keycenter = key;
    }
    parse_into(&mut spec.lokey, lookup("lokey"));
    parse_into(&mut spec.hikey, lookup("hikey"));
    parse_into(&mut spec.lovel, lookup("lovel"));
    parse_into(&mut spec.hivel, lookup("hivel"));
    parse_into(&mut spec.pitch_keycenter, lookup("pitch_keycenter"));
    parse_into(&mut spec.transpose, lookup("transpose"));
    parse_into(&mut spec.tune_cents, lookup("tune"));
    parse_into(&mut spec.volume_db, lookup("volume"));

    if let Some(mode) = lookup("loop_mode").or_else(|| lookup("loopmode")) {
        spec.loop_mode = match mode.as_str() {
            "one_shot" => LoopMode::OneShot,
            "loop_continuous" | "loop_sustain" => LoopMode::Continuous,
            _ => LoopMode::NoLoop,
        };
    }
    spec.loop_start = lookup("loop_start")
        .or_else(|| lookup("loopstart"))
        .and_then(|v| v.parse().ok());
    spec.loop_end = lookup("loop_end")
        .or_else(|| lookup("loopend"))
        .and_then(|v| v.parse().ok());

    file.regions.push(spec);
}

fn parse_into<T: core::str::FromStr>(slot: &mut T, value: Option<&String>) {
    if let Some(parsed) = value.and_then(|v| v.parse().ok()) {
        *slot = parsed;
    }
}
