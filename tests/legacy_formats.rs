// Loading every known project format version, plus backups and upgrades

use daw_session::project::serialization::{
    parse_document, read_compressed_document, write_compressed_document,
};
use daw_session::project::{FormatVersion, ProjectError, ProjectManager};
use daw_session::{SessionContext, Settings, SoftwareGraph};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::{TempDir, tempdir};

fn write_wav(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 4000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (seconds * spec.sample_rate as f32) as u32;
    for i in 0..frames {
        let v = ((i % 100) as i32 * 300 - 15_000) as i16;
        writer.write_sample(v).unwrap();
        writer.write_sample(-v).unwrap();
    }
    writer.finalize().unwrap();
}

/// Lay out `<dir>/Old/Old.jokosher` with an `audio/` directory holding a WAV
fn legacy_project(xml: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let project_dir = dir.path().join("Old");
    std::fs::create_dir_all(project_dir.join("audio")).unwrap();
    write_wav(&project_dir.join("audio").join("riff.wav"), 2.0);

    let xml = xml.replace("@AUDIO@", &project_dir.join("audio").to_string_lossy());
    let file = project_dir.join("Old.jokosher");
    write_compressed_document(&file, &parse_document(&xml).unwrap()).unwrap();
    (dir, file)
}

const V0_1_PROJECT: &str = r#"<?xml version="1.0"?>
<JokosherProject version="0.1">
  <Parameters>
    <name type="str" value="Garage Demo"/>
    <author type="str" value="Eve"/>
    <viewScale type="float" value="30.0"/>
  </Parameters>
  <Instrument id="0">
    <Parameters>
      <name type="str" value="Lead"/>
      <pixbufPath type="str" value="/usr/share/jokosher/pixmaps/electricguitar.png"/>
      <pan type="float" value="0.5"/>
      <isMuted type="bool" value="True"/>
    </Parameters>
    <Event id="0">
      <Parameters>
        <name type="str" value="riff"/>
        <start type="float" value="-3.0"/>
        <file type="str" value="@AUDIO@/riff.wav"/>
      </Parameters>
      <FadePoints>
        <FadePoint position="0.0" fade="0.0"/>
        <FadePoint position="1.0" fade="1.0"/>
        <FadePoint position="9.0" fade="1.0"/>
      </FadePoints>
    </Event>
  </Instrument>
  <Instrument id="1">
    <Parameters>
      <name type="str" value="Bass"/>
      <pixbufPath type="str" value="/usr/share/jokosher/pixmaps/bassguitar.png"/>
    </Parameters>
  </Instrument>
</JokosherProject>
"#;

const V0_2_PROJECT: &str = r#"<?xml version="1.0"?>
<JokosherProject version="0.2">
  <Parameters>
    <name type="str" value="Band Practice"/>
    <author type="str" value="Fay"/>
    <transportMode type="int" value="2"/>
  </Parameters>
  <Instrument id="4">
    <Parameters>
      <name type="str" value="Keys"/>
      <instrType type="str" value="keyboard"/>
      <isSolo type="bool" value="True"/>
    </Parameters>
    <GlobalEffect element="audioecho">
      <Item key="intensity" keytype="str" value="0.4" type="float"/>
      <Item key="no-such-property" keytype="str" value="1" type="int"/>
    </GlobalEffect>
    <GlobalEffect element="lv2-unknown-plugin"/>
    <Event id="2">
      <Parameters>
        <start type="float" value="1.5"/>
        <duration type="float" value="2.0"/>
        <file type="str" value="riff.wav"/>
      </Parameters>
      <FadePoints>
        <Item key="0.25" keytype="float" value="0.5" type="float"/>
      </FadePoints>
      <Levels value="0.1,0.2,0.3"/>
    </Event>
  </Instrument>
  <Instrument id="5">
    <Parameters>
      <name type="str" value="Drums"/>
      <instrType type="str" value="drums"/>
    </Parameters>
  </Instrument>
  <DeadInstrument id="9">
    <Parameters><name type="str" value="Ignored before 0.9"/></Parameters>
  </DeadInstrument>
</JokosherProject>
"#;

const V0_9_PROJECT: &str = r#"<?xml version="1.0"?>
<JokosherProject version="0.9">
  <Parameters>
    <name type="str" value="Album"/>
    <author type="str" value="Gus"/>
  </Parameters>
  <Undo>
    <Action>
      <Command object="P" function="ResurrectInstrument">
        <Item value="2" type="int"/>
      </Command>
    </Action>
    <Action>
      <Command object="E1.0" function="Move">
        <Item value="0.0" type="float"/>
      </Command>
    </Action>
  </Undo>
  <Redo/>
  <Instrument id="1">
    <Parameters>
      <name type="str" value="Vocals"/>
      <instrType type="str" value="voice"/>
    </Parameters>
    <Event id="0">
      <Parameters>
        <start type="float" value="4.0"/>
        <duration type="float" value="2.0"/>
        <file type="str" value="riff.wav"/>
        <isLoading type="bool" value="True"/>
      </Parameters>
      <Levels value="0.5"/>
    </Event>
    <DeadEvent id="1">
      <Parameters>
        <duration type="float" value="2.0"/>
        <file type="str" value="riff.wav"/>
      </Parameters>
      <Levels value="0.5,0.5"/>
    </DeadEvent>
  </Instrument>
  <DeadInstrument id="2">
    <Parameters>
      <name type="str" value="Cowbell"/>
      <instrType type="str" value="percussion"/>
    </Parameters>
  </DeadInstrument>
</JokosherProject>
"#;

fn load(file: &Path) -> ProjectManager {
    let mut manager = ProjectManager::new(SessionContext::software());
    manager.load_project(&file.to_string_lossy()).unwrap();
    manager
}

#[test]
fn test_load_version_0_1() {
    let (_dir, file) = legacy_project(V0_1_PROJECT);
    let manager = load(&file);
    let project = manager.active().unwrap();

    assert_eq!(project.name(), "Garage Demo");
    assert_eq!(project.author(), "Eve");
    assert_eq!(project.view_scale(), 30.0);
    assert_eq!(project.instruments().len(), 2);
    assert!(project.graveyard().is_empty());
    assert!(!project.history().can_undo());

    let lead = project.instrument(0).unwrap();
    assert_eq!(lead.instr_type(), "electricguitar");
    assert_eq!(lead.pan(), 0.5);
    assert!(lead.is_actually_muted());
    assert_eq!(project.instrument(1).unwrap().instr_type(), "bassguitar");

    let riff = lead.event(0).unwrap();
    assert_eq!(riff.start(), 0.0);
    // No Levels node: regenerated from the file, which also gives the duration
    assert_eq!(riff.levels().len(), 20);
    assert!((riff.duration() - 2.0).abs() < 1e-6);
    // The point past the end of the event is dropped
    assert_eq!(riff.fade_points().len(), 2);
    assert_eq!(riff.fade_points().get(1.0), Some(1.0));
}

#[test]
fn test_load_version_0_2() {
    let (_dir, file) = legacy_project(V0_2_PROJECT);
    let manager = load(&file);
    let project = manager.active().unwrap();

    assert_eq!(project.name(), "Band Practice");
    assert_eq!(project.transport().mode().as_i64(), 2);
    assert_eq!(project.instruments().len(), 2);
    assert!(project.graveyard().is_empty());
    assert_eq!(project.solo_count(), 1);

    let keys = project.instrument(4).unwrap();
    assert_eq!(keys.effects().len(), 1);
    assert_eq!(keys.effects()[0].factory(), "audioecho");
    assert_eq!(keys.effects()[0].properties().len(), 1);
    assert!(!keys.is_actually_muted());
    assert!(project.instrument(5).unwrap().is_actually_muted());

    let event = keys.event(2).unwrap();
    assert_eq!(event.file(), file.parent().unwrap().join("audio").join("riff.wav"));
    assert_eq!(event.levels().to_vec(), vec![0.1f32, 0.2, 0.3]);
    assert_eq!(event.fade_points().get(0.25), Some(0.5));
    assert_eq!(event.start(), 1.5);
}

#[test]
fn test_load_version_0_9() {
    let (_dir, file) = legacy_project(V0_9_PROJECT);
    let manager = load(&file);
    let project = manager.active().unwrap();

    assert_eq!(project.instruments().len(), 1);
    assert_eq!(project.graveyard().len(), 1);
    assert_eq!(project.graveyard()[0].name(), "Cowbell");
    assert_eq!(project.history().undo_count(), 2);
    assert_eq!(project.history().redo_count(), 0);

    let vocals = project.instrument(1).unwrap();
    assert_eq!(vocals.events().len(), 1);
    assert_eq!(vocals.graveyard().len(), 1);
    // isLoading forces regeneration over the stored levels
    assert_eq!(vocals.event(0).unwrap().levels().len(), 20);
    assert!(!vocals.event(0).unwrap().is_loading());
    assert_eq!(vocals.graveyard()[0].levels().to_vec(), vec![0.5f32, 0.5]);

    // Current format: no backup
    assert!(!file.with_file_name("Old.0.9.jokosher").exists());
}

#[test]
fn test_restored_history_replays() {
    let (_dir, file) = legacy_project(V0_9_PROJECT);
    let mut manager = load(&file);
    let project = manager.active_mut().unwrap();

    assert_eq!(project.instrument(1).unwrap().event(0).unwrap().start(), 4.0);
    project.undo().unwrap();
    assert_eq!(project.instrument(1).unwrap().event(0).unwrap().start(), 0.0);
    project.undo().unwrap();
    assert_eq!(project.instruments().len(), 2);
    assert!(project.graveyard().is_empty());

    project.redo().unwrap();
    assert_eq!(project.instruments().len(), 1);
}

#[test]
fn test_legacy_load_keeps_backup_and_upgrades() {
    let (_dir, file) = legacy_project(V0_2_PROJECT);
    let original = std::fs::read(&file).unwrap();

    let manager = load(&file);
    let backup = file.with_file_name("Old.0.2.jokosher");
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    manager.save_project().unwrap();
    let root = read_compressed_document(&file).unwrap();
    assert_eq!(root.attr("version"), Some(FormatVersion::CURRENT.as_str()));
    // The backup is never overwritten
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let upgraded = load(&file);
    assert_eq!(upgraded.active().unwrap().instruments().len(), 2);
}

#[test]
fn test_unknown_version() {
    let (_dir, file) = legacy_project(&V0_9_PROJECT.replace("version=\"0.9\"", "version=\"7.7\""));
    let mut manager = ProjectManager::new(SessionContext::software());
    match manager.load_project(&file.to_string_lossy()) {
        Err(ProjectError::UnsupportedVersion(version)) => assert_eq!(version, "7.7"),
        other => panic!("expected UnsupportedVersion, got {:?}", other.map(|p| p.name().to_string())),
    }
    assert!(!manager.has_active());
}

#[test]
fn test_missing_root_parameters_is_corrupt() {
    let (_dir, file) = legacy_project(r#"<JokosherProject version="0.9"><Undo/></JokosherProject>"#);
    let mut manager = ProjectManager::new(SessionContext::software());
    assert!(matches!(
        manager.load_project(&file.to_string_lossy()),
        Err(ProjectError::CorruptArchive { .. })
    ));
}

#[test]
fn test_missing_plugin() {
    let graph = SoftwareGraph::with_standard_plugins().without_factory("gnlcomposition");
    let mut manager = ProjectManager::new(SessionContext::with_graph(Rc::new(graph)));
    let dir = tempdir().unwrap();

    let result = manager.create_project(&dir.path().to_string_lossy(), "Demo", "Ann");
    assert!(matches!(result, Err(ProjectError::MissingCapability(ref p)) if p == "gnlcomposition"));
    assert!(!dir.path().join("Demo").exists());
}

#[test]
fn test_version_0_1_relative_file_resolves_against_audio_dir() {
    let xml = V0_1_PROJECT.replace("@AUDIO@/riff.wav", "riff.wav");
    let (_dir, file) = legacy_project(&xml);
    let manager = load(&file);
    let project = manager.active().unwrap();

    let riff = project.instrument(0).unwrap().event(0).unwrap();
    assert_eq!(riff.file(), file.parent().unwrap().join("audio").join("riff.wav"));
    assert_eq!(riff.levels().len(), 20);
    assert!(manager.validate_active().is_ok());
}

#[test]
fn test_failed_undo_leaves_project_unchanged() {
    // Replayed last to first: I1.SetPan runs, then I99 does not exist
    let xml = V0_9_PROJECT.replace(
        r#"<Command object="P" function="ResurrectInstrument">
        <Item value="2" type="int"/>
      </Command>"#,
        r#"<Command object="I99" function="SetPan">
        <Item value="0.1" type="float"/>
      </Command>
      <Command object="I1" function="SetPan">
        <Item value="0.5" type="float"/>
      </Command>"#,
    );
    let (_dir, file) = legacy_project(&xml);
    let mut manager = load(&file);
    let project = manager.active_mut().unwrap();
    assert_eq!(project.history().undo_count(), 2);

    // The Move action on top undoes cleanly
    project.undo().unwrap();
    assert!(project.undo().is_err());
    assert_eq!(project.instrument(1).unwrap().pan(), 0.0);
    assert_eq!(project.history().undo_count(), 1);
    assert_eq!(project.history().redo_count(), 1);

    assert!(project.undo().is_err());
    assert_eq!(project.instrument(1).unwrap().pan(), 0.0);
}

#[test]
fn test_wired_graveyard_stays_in_graph() {
    let (_dir, file) = legacy_project(V0_9_PROJECT);
    let graph = Rc::new(SoftwareGraph::with_standard_plugins());
    let settings = Settings {
        wire_graveyard: true,
        ..Settings::default()
    };
    let mut manager = ProjectManager::new(SessionContext::from_settings(graph.clone(), settings));
    let project = manager.load_project(&file.to_string_lossy()).unwrap();

    let cowbell = &project.graveyard()[0];
    assert_eq!(graph.parent_of(cowbell.bin()), Some(project.pipeline()));
    assert!(cowbell.follows_transport());

    let vocals = project.instrument(1).unwrap();
    let dead = vocals.graveyard()[0].source_element().unwrap();
    assert_eq!(graph.parent_of(dead), Some(vocals.composition()));
}

#[test]
fn test_unwired_graveyard_is_unlinked() {
    let (_dir, file) = legacy_project(V0_9_PROJECT);
    let graph = Rc::new(SoftwareGraph::with_standard_plugins());
    let mut manager = ProjectManager::new(SessionContext::with_graph(graph.clone()));
    let project = manager.load_project(&file.to_string_lossy()).unwrap();

    assert_eq!(graph.parent_of(project.graveyard()[0].bin()), None);
    let vocals = project.instrument(1).unwrap();
    let dead = vocals.graveyard()[0].source_element().unwrap();
    assert_eq!(graph.parent_of(dead), None);
}

#[test]
fn test_version_attribute_must_match_exactly() {
    let (_dir, file) = legacy_project(&V0_9_PROJECT.replace("version=\"0.9\"", "version=\" 0.9\""));
    let mut manager = ProjectManager::new(SessionContext::software());
    match manager.load_project(&file.to_string_lossy()) {
        Err(ProjectError::UnsupportedVersion(version)) => assert_eq!(version, " 0.9"),
        other => panic!("expected UnsupportedVersion, got {:?}", other.map(|p| p.name().to_string())),
    }
}

#[test]
fn test_event_without_file_is_not_a_missing_asset() {
    let xml = V0_9_PROJECT.replace(
        r#"<file type="str" value="riff.wav"/>
        <isLoading type="bool" value="True"/>"#,
        r#"<isLoading type="bool" value="True"/>"#,
    );
    let (_dir, file) = legacy_project(&xml);
    let manager = load(&file);

    let event = manager.active().unwrap().instrument(1).unwrap().event(0).unwrap();
    assert!(event.file().as_os_str().is_empty());
    assert!(manager.validate_active().is_ok());
}
