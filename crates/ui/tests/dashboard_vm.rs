use std::sync::Arc;
use std::time::Duration;

use attend_core::model::{RosterEntry, SessionDraft};
use attend_core::time::fixed_now;
use backend::InMemoryBackend;
use services::{Clock, Dashboard, DashboardConfig, VisibleView};
use ui::{map_dashboard, render_dashboard};

#[tokio::test(start_paused = true)]
async fn frames_follow_session_lifecycle() {
    let backend = InMemoryBackend::new();
    let mut dashboard = Dashboard::new(
        Arc::new(backend.clone()),
        DashboardConfig::default(),
        Clock::fixed(fixed_now()),
    );

    dashboard
        .create_session(SessionDraft::new("Math", "Room 1"))
        .unwrap();
    assert!(map_dashboard(&dashboard).creating);
    assert!(
        dashboard
            .pump_until(Duration::from_secs(1), |d| d.session().is_some())
            .await
    );

    let vm = map_dashboard(&dashboard);
    assert_eq!(vm.view, VisibleView::Qr);
    let qr = vm.qr.as_ref().unwrap();
    assert_eq!(qr.remaining_str, "02:00");
    assert!(vm.roster.is_none());
    assert!(render_dashboard(&vm).contains("== Math / Room 1 =="));

    let id = dashboard.session().unwrap().id().clone();
    backend
        .record_attendance(
            &id,
            RosterEntry {
                student_id: "u1".into(),
                name: "Ada".into(),
                email: "ada@uni.edu".into(),
            },
        )
        .unwrap();
    dashboard.close_qr_view();
    assert!(map_dashboard(&dashboard).roster_loading);
    assert!(
        dashboard
            .pump_until(Duration::from_secs(5), |d| {
                d.visible_view() == VisibleView::Roster
            })
            .await
    );

    let vm = map_dashboard(&dashboard);
    assert!(vm.qr.is_none());
    let roster = vm.roster.as_ref().unwrap();
    assert_eq!(roster.rows.len(), 1);
    assert!(roster.empty_message.is_none());
    assert!(roster.export_enabled);
    assert!(render_dashboard(&vm).contains("(1 students)"));
}

#[tokio::test(start_paused = true)]
async fn countdown_follows_shared_clock() {
    let backend = InMemoryBackend::new();
    let mut wall = Clock::manual(fixed_now());
    let mut dashboard = Dashboard::new(
        Arc::new(backend.clone()),
        DashboardConfig::default(),
        wall.clone(),
    );

    dashboard
        .create_session(SessionDraft::new("Physics", "Lab 2"))
        .unwrap();
    assert!(
        dashboard
            .pump_until(Duration::from_secs(1), |d| d.session().is_some())
            .await
    );

    wall.advance(chrono::Duration::seconds(30));
    let vm = map_dashboard(&dashboard);
    assert_eq!(vm.qr.as_ref().unwrap().remaining_str, "01:30");

    wall.advance(chrono::Duration::seconds(200));
    let vm = map_dashboard(&dashboard);
    assert_eq!(vm.qr.as_ref().unwrap().remaining_str, "00:00");
}
