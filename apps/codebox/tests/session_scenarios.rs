use codebox_client_core::proto::{encoding, NodeKind};
use codebox_client_core::session::{ActionError, Controller, UserAction, ValidationError};
use codebox_client_core::surface::recording::{MemoryEditor, RecordingSurface, SurfaceCall};
use codebox_client_core::surface::NoticeKind;
use codebox_client_core::transport::mock::RecordingSink;
use codebox_client_core::transport::{ConnectionEvent, FailureCause};
use tokio::time::Instant;

type TestController = Controller<RecordingSurface, MemoryEditor, RecordingSink>;

const LISTING: &str = r#"[
    {"type":"folder","name":"a","children":[
        {"type":"file","name":"b.py","extension":"py"},
        {"type":"folder","name":"lib","children":[
            {"type":"file","name":"util.py","extension":"py"}
        ]}
    ]},
    {"type":"file","name":"notes.txt","extension":"txt"}
]"#;

fn controller() -> TestController {
    Controller::new(RecordingSurface::new(), MemoryEditor::new(), RecordingSink::new())
}

fn act(c: &mut TestController, action: UserAction) -> Result<(), ActionError> {
    c.handle_action(action, Instant::now())
}

fn frame(c: &mut TestController, raw: &str) {
    c.handle_frame(raw).unwrap();
}

fn logged_in(listing: &str) -> TestController {
    let mut c = controller();
    act(
        &mut c,
        UserAction::Login {
            email: "user@x.com".into(),
            password: "pw1".into(),
        },
    )
    .unwrap();
    frame(&mut c, &format!("LOGR~{listing}"));
    c.sink_mut().take_frames();
    c.surface_mut().take_calls();
    c
}

/// Logs in and opens `path`, with the server returning `content`.
fn with_open_file(path: &str, content: &str) -> TestController {
    let mut c = logged_in(LISTING);
    act(&mut c, UserAction::OpenFile { path: path.into() }).unwrap();
    frame(&mut c, &format!("FILC~{}", encoding::encode_text(content)));
    c.sink_mut().take_frames();
    c.surface_mut().take_calls();
    c
}

#[test_timeout::timeout]
fn login_reply_authenticates_with_the_requested_email() {
    let mut c = controller();
    act(
        &mut c,
        UserAction::Login {
            email: "user@x.com".into(),
            password: "pw1".into(),
        },
    )
    .unwrap();
    assert_eq!(c.sink().frames(), ["LOGN~user@x.com~pw1"]);
    assert!(!c.session().auth().is_authenticated());

    frame(&mut c, "LOGR~[]");

    assert_eq!(c.session().auth().email(), Some("user@x.com"));
    assert!(c.session().tree().is_empty());
    assert!(!c.session().pending_run());
    assert!(!c.session().pending_save());
    assert_eq!(c.surface().run_locked(), None);
    assert_eq!(c.surface().save_locked(), None);
    assert!(c
        .surface()
        .calls()
        .contains(&SurfaceCall::Identity("user@x.com".into())));
    assert!(c.surface().calls().contains(&SurfaceCall::FilesEnabled(true)));
    assert_eq!(c.surface().alerts(), vec!["Logged in. Welcome! (user@x.com)"]);
}

#[test_timeout::timeout]
fn registration_does_not_log_in() {
    let mut c = controller();
    act(
        &mut c,
        UserAction::Register {
            email: "new@x.com".into(),
            password: "pw".into(),
        },
    )
    .unwrap();
    frame(&mut c, "REGR");
    assert!(!c.session().auth().is_authenticated());
    assert_eq!(c.surface().alerts(), vec!["Registered successfully!"]);
    assert!(c.surface().calls().contains(&SurfaceCall::ClearCredentials));
}

#[test_timeout::timeout]
fn running_an_edited_file_saves_then_runs() {
    let mut c = with_open_file("a/b.py", "print(1)\n");
    assert_eq!(c.editor().text, "print(1)\n");

    c.editor_mut().text = "print(2)\n".into();
    act(&mut c, UserAction::EditorChanged).unwrap();
    assert!(c.session().is_dirty());

    act(&mut c, UserAction::Run).unwrap();

    assert_eq!(
        c.sink().frames(),
        [
            r#"SAVF~{"path":"a/b.py","content":"print(2)\n"}"#,
            "RUNF~a/b.py",
        ]
    );
    assert!(c.session().pending_run());
    assert!(c.session().pending_save());
    assert_eq!(c.surface().run_locked(), Some(true));
    assert_eq!(c.surface().save_locked(), Some(true));
}

#[test_timeout::timeout]
fn snippet_run_streams_output_and_reports_status() {
    let mut c = controller();
    c.editor_mut().text = "print('hi')".into();
    act(&mut c, UserAction::Run).unwrap();
    assert_eq!(c.sink().frames(), ["EXEC~cHJpbnQoJ2hpJyk="]);

    let err = act(&mut c, UserAction::Run).unwrap_err();
    assert!(matches!(
        err,
        ActionError::Invalid(ValidationError::RunInProgress)
    ));
    assert_eq!(c.sink().frames().len(), 1);

    frame(&mut c, &format!("OUTP~{}", encoding::encode_text("hi\n")));
    frame(&mut c, &format!("OUTP~{}", encoding::encode_text("there\n")));
    frame(&mut c, "DONE~0");

    assert_eq!(
        c.surface().output(),
        "hi\nthere\n\n=== Code Execution Successful ==="
    );
    assert!(!c.session().pending_run());
    assert_eq!(c.surface().run_locked(), Some(false));
    assert_eq!(c.surface().save_locked(), Some(false));
}

#[test_timeout::timeout]
fn unknown_return_code_uses_fallback_message() {
    for (done, expected) in [
        ("DONE~2", "\n=== Code Execution Environment Failed (Server Error) ==="),
        ("DONE~3", "\n=== Reached execution timeout ==="),
        ("DONE~42", "\n=== Unknown error or signal ==="),
        ("DONE~-9", "\n=== Unknown error or signal ==="),
        ("DONE~x", "\n=== Unknown error or signal ==="),
    ] {
        let mut c = controller();
        c.editor_mut().text = "1".into();
        act(&mut c, UserAction::Run).unwrap();
        frame(&mut c, done);
        assert_eq!(c.surface().output(), expected, "for {done}");
    }
}

#[test_timeout::timeout]
fn done_keeps_save_locked_while_a_save_is_in_flight() {
    let mut c = with_open_file("a/b.py", "x = 1\n");
    act(&mut c, UserAction::Run).unwrap();
    frame(&mut c, "DONE~0");
    assert!(c.session().pending_save());
    assert_eq!(c.surface().run_locked(), Some(false));
    assert_eq!(c.surface().save_locked(), Some(true));

    frame(&mut c, "SAVR");
    assert_eq!(c.surface().save_locked(), Some(false));
    assert_eq!(
        c.surface().notices(),
        vec![(NoticeKind::Success, "File was saved successfully!")]
    );
}

#[test_timeout::timeout]
fn save_is_rejected_while_locked() {
    let mut c = with_open_file("notes.txt", "");
    act(&mut c, UserAction::Save).unwrap();
    let err = act(&mut c, UserAction::Save).unwrap_err();
    assert!(matches!(
        err,
        ActionError::Invalid(ValidationError::SaveInProgress)
    ));
    assert_eq!(c.sink().frames().len(), 1);

    let mut anonymous = controller();
    assert!(matches!(
        act(&mut anonymous, UserAction::Save),
        Err(ActionError::Invalid(ValidationError::NoFileOpen))
    ));
}

#[test_timeout::timeout]
fn opening_a_file_shows_placeholder_until_content_arrives() {
    let mut c = logged_in(LISTING);
    act(
        &mut c,
        UserAction::OpenFile {
            path: "a/lib/util.py".into(),
        },
    )
    .unwrap();

    assert_eq!(c.sink().frames(), ["GETF~a/lib/util.py"]);
    assert_eq!(c.editor().text, "# Loading util.py...");
    assert!(c.editor().read_only);
    assert!(c.session().current_file().unwrap().loading);

    frame(&mut c, &format!("FILC~{}", encoding::encode_text("def f():\n    pass\n")));
    assert_eq!(c.editor().text, "def f():\n    pass\n");
    assert!(!c.editor().read_only);
    let file = c.session().current_file().unwrap();
    assert_eq!(file.path, "a/lib/util.py");
    assert!(!file.dirty);
}

#[test_timeout::timeout]
fn content_for_a_file_no_longer_waiting_is_dropped() {
    let mut c = logged_in(LISTING);
    act(&mut c, UserAction::OpenFile { path: "a/b.py".into() }).unwrap();
    act(&mut c, UserAction::OpenFile { path: "notes.txt".into() }).unwrap();

    // Reply to the first request lands after the user moved on.
    frame(&mut c, &format!("FILC~{}", encoding::encode_text("SECRET_A")));
    assert_eq!(c.editor().text, "# Loading notes.txt...");
    assert!(c.editor().read_only);
    let file = c.session().current_file().unwrap();
    assert_eq!(file.path, "notes.txt");
    assert!(file.loading);
    assert!(matches!(
        act(&mut c, UserAction::Save),
        Err(ActionError::Invalid(ValidationError::FileLoading(_)))
    ));

    frame(&mut c, &format!("FILC~{}", encoding::encode_text("todo")));
    assert_eq!(c.editor().text, "todo");
    assert!(!c.editor().read_only);
    assert!(!c.session().current_file().unwrap().loading);

    c.sink_mut().take_frames();
    act(&mut c, UserAction::EditorChanged).unwrap();
    act(&mut c, UserAction::Save).unwrap();
    assert_eq!(
        c.sink().frames(),
        [r#"SAVF~{"path":"notes.txt","content":"todo"}"#]
    );
}

#[test_timeout::timeout]
fn content_for_a_file_deleted_while_loading_is_dropped() {
    let mut c = logged_in(LISTING);
    act(&mut c, UserAction::OpenFile { path: "a/b.py".into() }).unwrap();
    act(&mut c, UserAction::Delete { path: "a/b.py".into() }).unwrap();
    assert_eq!(c.editor().text, "");

    frame(&mut c, &format!("FILC~{}", encoding::encode_text("deleted body")));
    assert!(c.session().current_file().is_none());
    assert_eq!(c.editor().text, "");

    c.sink_mut().take_frames();
    c.editor_mut().text = "print(2)".into();
    act(&mut c, UserAction::Run).unwrap();
    assert_eq!(
        c.sink().frames(),
        [format!("EXEC~{}", encoding::encode_text("print(2)"))]
    );
}

#[test_timeout::timeout]
fn switching_away_from_a_dirty_file_autosaves_it() {
    let mut c = with_open_file("a/b.py", "old");
    c.editor_mut().text = "new".into();
    act(&mut c, UserAction::EditorChanged).unwrap();

    act(
        &mut c,
        UserAction::OpenFile {
            path: "notes.txt".into(),
        },
    )
    .unwrap();
    assert_eq!(
        c.sink().frames(),
        [r#"SAVF~{"path":"a/b.py","content":"new"}"#, "GETF~notes.txt"]
    );
    assert!(!c.session().is_dirty());
}

#[test_timeout::timeout]
fn created_nodes_are_found_at_their_paths() {
    let mut c = logged_in(LISTING);
    act(
        &mut c,
        UserAction::SelectFolder {
            path: Some("a/lib".into()),
        },
    )
    .unwrap();
    assert!(!c
        .session()
        .tree()
        .list_sibling_names(Some("a/lib"))
        .contains("c.rs"));

    act(
        &mut c,
        UserAction::Create {
            kind: NodeKind::File,
            name: "c.rs".into(),
        },
    )
    .unwrap();
    assert_eq!(
        c.sink().frames(),
        [r#"CREA~{"type":"file","name":"c.rs","path":"a/lib/c.rs"}"#]
    );
    frame(&mut c, "CRER");

    let node = c.session().tree().find_by_path("a/lib/c.rs").unwrap();
    assert_eq!(node.name(), "c.rs");
    assert!(c
        .session()
        .tree()
        .list_sibling_names(Some("a/lib"))
        .contains("c.rs"));
    assert_eq!(
        c.surface().notices(),
        vec![(NoticeKind::Success, "Storage updated")]
    );
    let rendered = c.surface().last_tree().unwrap();
    assert_eq!(rendered, c.session().tree().roots());
}

#[test_timeout::timeout]
fn duplicate_sibling_is_rejected_locally() {
    let mut c = logged_in("[]");
    let create = || UserAction::Create {
        kind: NodeKind::File,
        name: "a.txt".into(),
    };
    act(&mut c, create()).unwrap();
    let err = act(&mut c, create()).unwrap_err();

    assert!(matches!(
        err,
        ActionError::Invalid(ValidationError::DuplicateName(ref name)) if name == "a.txt"
    ));
    assert_eq!(c.sink().frames().len(), 1);
    assert_eq!(c.session().tree().roots().len(), 1);
}

#[test_timeout::timeout]
fn create_validates_names_before_sending() {
    let mut c = logged_in(LISTING);
    for (kind, name) in [
        (NodeKind::File, ""),
        (NodeKind::File, "Makefile"),
        (NodeKind::Folder, "a"),
    ] {
        assert!(act(
            &mut c,
            UserAction::Create {
                kind,
                name: name.into()
            }
        )
        .is_err());
    }
    assert!(c.sink().frames().is_empty());

    let mut anonymous = controller();
    assert!(matches!(
        act(
            &mut anonymous,
            UserAction::Create {
                kind: NodeKind::Folder,
                name: "x".into()
            }
        ),
        Err(ActionError::Invalid(ValidationError::NotAuthenticated))
    ));
}

#[test_timeout::timeout]
fn create_failure_is_a_soft_notification() {
    let mut c = logged_in("[]");
    act(
        &mut c,
        UserAction::Create {
            kind: NodeKind::Folder,
            name: "src".into(),
        },
    )
    .unwrap();
    frame(&mut c, "ERRR~301");

    assert!(c.surface().alerts().is_empty());
    assert_eq!(
        c.surface().notices(),
        vec![(NoticeKind::Error, "Error: Failed to create file or folder (301)")]
    );
    // Not rolled back on a server-side failure.
    assert!(c.session().tree().find_by_path("src").is_some());
    assert!(!c.surface().calls().contains(&SurfaceCall::ClearCredentials));
}

#[test_timeout::timeout]
fn other_errors_are_blocking() {
    let mut c = logged_in("[]");
    frame(&mut c, "ERRR~302");
    assert_eq!(c.surface().calls().last(), Some(&SurfaceCall::ClearCredentials));
    frame(&mut c, "ERRR~777");
    assert_eq!(
        c.surface().alerts(),
        vec!["Error: Failed to delete file (302)", "Error: Unknown error (777)"]
    );
    let cleared = c
        .surface()
        .calls()
        .iter()
        .filter(|call| **call == SurfaceCall::ClearCredentials)
        .count();
    assert_eq!(cleared, 2);
    assert!(c.session().auth().is_authenticated());
}

#[test_timeout::timeout]
fn deleting_the_open_file_clears_it_before_confirmation() {
    let mut c = with_open_file("a/b.py", "print(1)\n");
    act(
        &mut c,
        UserAction::Delete {
            path: "a/b.py".into(),
        },
    )
    .unwrap();

    assert_eq!(c.sink().frames(), ["DELF~a/b.py"]);
    assert!(c.session().current_file().is_none());
    assert_eq!(c.editor().text, "");
    assert!(c.session().tree().find_by_path("a/b.py").is_none());
    assert!(c.surface().calls().contains(&SurfaceCall::CurrentFile(None)));

    frame(&mut c, "DELR");
    assert_eq!(
        c.surface().notices(),
        vec![(NoticeKind::Success, "File was deleted successfully!")]
    );
}

#[test_timeout::timeout]
fn deleting_a_folder_closes_files_inside_it() {
    let mut c = with_open_file("a/lib/util.py", "x");
    act(&mut c, UserAction::SelectFolder { path: Some("a/lib".into()) }).unwrap();
    act(&mut c, UserAction::Delete { path: "a".into() }).unwrap();
    assert!(c.session().current_file().is_none());
    assert_eq!(c.session().selected_folder(), None);
    assert_eq!(c.session().tree().roots().len(), 1);
}

#[test_timeout::timeout]
fn delete_without_connection_changes_nothing() {
    let mut c = with_open_file("a/b.py", "x");
    c.sink_mut().set_open(false);
    let err = act(
        &mut c,
        UserAction::Delete {
            path: "a/b.py".into(),
        },
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to delete file: Server connection not available"
    );
    assert!(c.session().current_file().is_some());
    assert!(c.session().tree().find_by_path("a/b.py").is_some());
    assert_eq!(
        c.surface().notices(),
        vec![(
            NoticeKind::Error,
            "Unable to delete file: Server connection not available"
        )]
    );
}

#[test_timeout::timeout]
fn input_request_round_trip() {
    let mut c = controller();
    c.editor_mut().text = "name = input('Name? ')".into();
    act(&mut c, UserAction::Run).unwrap();
    c.sink_mut().take_frames();

    frame(&mut c, r#"INPT~{"prompt":"Name? "}"#);
    assert_eq!(c.session().pending_input().unwrap().prompt, "Name? ");
    assert!(c
        .surface()
        .calls()
        .contains(&SurfaceCall::BeginInput("Name? ".into())));

    act(&mut c, UserAction::InputCommitted { line: "Bob".into() }).unwrap();

    assert_eq!(c.sink().frames(), ["INPR~Qm9i"]);
    assert_eq!(c.surface().output(), "Name? Bob\n");
    assert!(c.session().pending_input().is_none());
    assert!(matches!(
        act(&mut c, UserAction::InputCommitted { line: "again".into() }),
        Err(ActionError::Invalid(ValidationError::NoInputPending))
    ));
}

#[test_timeout::timeout]
fn output_during_input_is_flushed_after_the_echo() {
    let mut c = controller();
    c.editor_mut().text = "x".into();
    act(&mut c, UserAction::Run).unwrap();
    frame(&mut c, "INPT");
    frame(&mut c, &format!("OUTP~{}", encoding::encode_text("late\n")));
    assert_eq!(c.surface().output(), "");

    act(&mut c, UserAction::InputCommitted { line: "42".into() }).unwrap();
    assert_eq!(c.surface().output(), "42\nlate\n");
}

#[test_timeout::timeout]
fn unavailable_input_region_replies_with_failure_frame() {
    let mut c = Controller::new(
        RecordingSurface::refusing_input(),
        MemoryEditor::with_text("input()"),
        RecordingSink::new(),
    );
    act(&mut c, UserAction::Run).unwrap();
    c.sink_mut().take_frames();

    frame(&mut c, r#"INPT~{"prompt":"? "}"#);
    assert_eq!(c.sink().frames(), ["INPR"]);
    assert!(c.session().pending_input().is_none());
}

#[test_timeout::timeout]
fn download_content_goes_to_the_requested_path() {
    let mut c = logged_in(LISTING);
    act(
        &mut c,
        UserAction::Download {
            path: "notes.txt".into(),
        },
    )
    .unwrap();
    assert_eq!(c.sink().frames(), ["DNLD~notes.txt"]);

    frame(&mut c, &format!("DNLR~{}", encoding::encode_text("todo")));
    assert!(c.surface().calls().contains(&SurfaceCall::Download(
        "notes.txt".into(),
        b"todo".to_vec()
    )));

    assert!(act(&mut c, UserAction::Download { path: "a".into() }).is_err());
}

#[test_timeout::timeout]
fn connection_failure_is_reported_once() {
    let mut c = controller();
    c.handle_connection_event(ConnectionEvent::Errored("reset".into()));
    c.handle_connection_event(ConnectionEvent::Failed(FailureCause::Error("reset".into())));
    c.handle_connection_event(ConnectionEvent::Closed);
    c.handle_connection_event(ConnectionEvent::Failed(FailureCause::Closed));
    assert_eq!(c.surface().connection_errors(), 1);
    assert!(c.session().connection_failed());
}

#[test_timeout::timeout]
fn malformed_frames_are_dropped() {
    let mut c = logged_in(LISTING);
    assert!(c.handle_frame("NOPE~1").is_err());
    assert!(c.handle_frame("FILC").is_err());
    c.handle_connection_event(ConnectionEvent::Message("LOGR~{not json".into()));
    assert_eq!(c.session().tree().roots().len(), 2);
}
