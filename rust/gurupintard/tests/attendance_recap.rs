mod ipc_support;

use ipc_support::spawn_with_workspace;
use serde_json::json;

#[test]
fn ten_sessions_with_late_and_sick_days() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = spawn_with_workspace(dir.path());

    let class_id = sc.create_class("XI IPS 2");
    let tracked = sc.create_student(&class_id, "1", "Ahmad");
    let _other = sc.create_student(&class_id, "2", "Zahra");

    let statuses = ["H", "H", "H", "H", "H", "H", "H", "T", "S", "S"];
    for (day, status) in statuses.iter().enumerate() {
        sc.ok(
            "attendance.save",
            json!({
                "classId": class_id,
                "date": format!("2024-03-{:02}", day + 1),
                "records": [{ "studentId": tracked, "status": status }]
            }),
        );
    }
    // A sheet from another month is not part of the recap.
    sc.ok(
        "attendance.save",
        json!({ "classId": class_id, "date": "2024-04-01", "records": [] }),
    );

    let recap = sc.ok("attendance.recap", json!({ "classId": class_id, "month": "2024-03" }));
    assert_eq!(recap["totalDays"], 10);
    let students = recap["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);

    let ahmad = students
        .iter()
        .find(|s| s["studentId"] == tracked.as_str())
        .expect("tracked student");
    assert_eq!(ahmad["counts"]["H"], 7);
    assert_eq!(ahmad["counts"]["T"], 1);
    assert_eq!(ahmad["counts"]["S"], 2);
    assert_eq!(ahmad["presentRate"], 80);

    // Students without an explicit record default to present.
    let zahra = students
        .iter()
        .find(|s| s["studentId"] != tracked.as_str())
        .expect("other student");
    assert_eq!(zahra["counts"]["H"], 10);
    assert_eq!(zahra["presentRate"], 100);

    assert_eq!(recap["totals"]["H"], 17);
    assert_eq!(recap["totals"]["total"], 20);

    let overall = sc.ok("analytics.studentAttendance", json!({ "studentId": tracked }));
    assert_eq!(overall["classId"], class_id.as_str());
    assert_eq!(overall["sessions"], 11);
    assert_eq!(overall["counts"]["S"], 2);
}

#[test]
fn saving_same_day_twice_keeps_one_sheet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = spawn_with_workspace(dir.path());

    let class_id = sc.create_class("XII");
    let s = sc.create_student(&class_id, "1", "Rani");

    let blank = sc.ok("attendance.get", json!({ "classId": class_id, "date": "2024-05-06" }));
    assert_eq!(blank["saved"], false);
    assert_eq!(blank["records"][0]["status"], "H");

    for status in ["A", "I"] {
        sc.ok(
            "attendance.save",
            json!({ "classId": class_id, "date": "2024-05-06", "records": [{ "studentId": s, "status": status }] }),
        );
    }
    let state = sc.state();
    let sheets = state["dailyAttendance"].as_array().expect("sheets");
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0]["id"], format!("{}_2024-05-06", class_id));
    assert_eq!(sheets[0]["records"][0]["status"], "I");

    let empty = sc.ok("attendance.recap", json!({ "classId": class_id, "month": "2023-01" }));
    assert_eq!(empty["totalDays"], 0);
    assert_eq!(empty["students"][0]["presentRate"], 0);

    assert_eq!(
        sc.err_code("attendance.recap", json!({ "classId": class_id, "month": "Maret" })),
        "bad_params"
    );
}
