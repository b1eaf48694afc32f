//! Synthetic student-placement records for a separate SQLite file.

pub mod schema;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use fake::faker::address::en::CityName;
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;

pub const DEFAULT_COUNT: u32 = 100;

const GENDERS: &[&str] = &["Male", "Female", "Other"];
const COURSE_BATCHES: &[&str] = &["Data Science", "Web Development", "Cyber Security", "AI and ML"];
const LANGUAGES: &[&str] = &["Python", "Java", "C++", "JavaScript"];
const PLACEMENT_STATUSES: &[&str] = &["Placed", "Not Ready", "Ready"];
const PLACED: &str = "Placed";
const PLACEMENT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn pick<R: Rng>(rng: &mut R, choices: &[&'static str]) -> &'static str {
    choices[rng.gen_range(0..choices.len())]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub student_id: i64,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub enrollment_year: i64,
    pub course_batch: String,
    pub city: String,
    pub graduation_year: i64,
}

impl Student {
    pub fn fake<R: Rng>(student_id: i64, rng: &mut R) -> Self {
        let enrollment_year = rng.gen_range(2022..=2025);
        Student {
            student_id,
            name: Name().fake_with_rng(rng),
            age: rng.gen_range(18..=25),
            gender: pick(rng, GENDERS).to_string(),
            email: SafeEmail().fake_with_rng(rng),
            phone: PhoneNumber().fake_with_rng(rng),
            enrollment_year,
            course_batch: pick(rng, COURSE_BATCHES).to_string(),
            city: CityName().fake_with_rng(rng),
            graduation_year: enrollment_year + 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammingSkills {
    pub student_id: i64,
    pub language: String,
    pub problems_solved: i64,
    pub assessments_completed: i64,
    pub mini_projects: i64,
    pub certifications_earned: i64,
    pub latest_project_score: i64,
}

impl ProgrammingSkills {
    pub fn fake<R: Rng>(student_id: i64, rng: &mut R) -> Self {
        ProgrammingSkills {
            student_id,
            language: pick(rng, LANGUAGES).to_string(),
            problems_solved: rng.gen_range(0..=200),
            assessments_completed: rng.gen_range(0..=10),
            mini_projects: rng.gen_range(0..=5),
            certifications_earned: rng.gen_range(0..=5),
            latest_project_score: rng.gen_range(40..=100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftSkills {
    pub student_id: i64,
    pub communication: i64,
    pub teamwork: i64,
    pub presentation: i64,
    pub leadership: i64,
    pub critical_thinking: i64,
    pub interpersonal_skills: i64,
}

impl SoftSkills {
    pub fn fake<R: Rng>(student_id: i64, rng: &mut R) -> Self {
        SoftSkills {
            student_id,
            communication: rng.gen_range(0..=100),
            teamwork: rng.gen_range(0..=100),
            presentation: rng.gen_range(0..=100),
            leadership: rng.gen_range(0..=100),
            critical_thinking: rng.gen_range(0..=100),
            interpersonal_skills: rng.gen_range(0..=100),
        }
    }
}

/// Placement outcome. Company, package and date are set only when placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub student_id: i64,
    pub mock_interview_score: i64,
    pub internships_completed: i64,
    pub placement_status: String,
    pub company_name: Option<String>,
    pub placement_package: Option<i64>,
    pub interview_rounds_cleared: i64,
    pub placement_date: Option<String>,
}

impl Placement {
    pub fn fake<R: Rng>(student_id: i64, rng: &mut R, now: NaiveDateTime) -> Self {
        let mock_interview_score = rng.gen_range(0..=100);
        let internships_completed = rng.gen_range(0..=10);
        let status = pick(rng, PLACEMENT_STATUSES);
        let placed = status == PLACED;

        let company_name = placed.then(|| CompanyName().fake_with_rng(rng));
        let placement_package = placed.then(|| rng.gen_range(100_000..=700_000));
        let interview_rounds_cleared = rng.gen_range(0..=5);
        let placement_date = placed.then(|| {
            date_this_year(rng, now)
                .format(PLACEMENT_DATE_FORMAT)
                .to_string()
        });

        Placement {
            student_id,
            mock_interview_score,
            internships_completed,
            placement_status: status.to_string(),
            company_name,
            placement_package,
            interview_rounds_cleared,
            placement_date,
        }
    }

    pub fn is_placed(&self) -> bool {
        self.placement_status == PLACED
    }
}

/// Uniform instant between Jan 1 of `now`'s year and `now`.
fn date_this_year<R: Rng>(rng: &mut R, now: NaiveDateTime) -> NaiveDateTime {
    let Some(start) = NaiveDate::from_ymd_opt(now.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return now;
    };
    let span = (now - start).num_seconds().max(0);
    start + TimeDelta::seconds(rng.gen_range(0..=span))
}

/// Summary of one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedStats {
    pub students: u32,
    pub placed: u32,
}

/// Generate and insert students `1..=count` with their three related records.
///
/// Each student is written in its own transaction. The first failing insert
/// stops the run; students committed before it stay in the database.
pub fn seed_students<R: Rng>(
    db: &Database,
    count: u32,
    rng: &mut R,
    now: NaiveDateTime,
) -> Result<SeedStats> {
    let mut stats = SeedStats::default();

    for id in 1..=i64::from(count) {
        let student = Student::fake(id, rng);
        let programming = ProgrammingSkills::fake(id, rng);
        let soft = SoftSkills::fake(id, rng);
        let placement = Placement::fake(id, rng, now);

        insert_student(db, &student, &programming, &soft, &placement)
            .with_context(|| format!("Failed to insert student {id}"))?;

        stats.students += 1;
        if placement.is_placed() {
            stats.placed += 1;
        }
        debug!(student_id = id, status = %placement.placement_status, "seeded student");
    }

    info!("Seeded {} students ({} placed)", stats.students, stats.placed);
    Ok(stats)
}

fn insert_student(
    db: &Database,
    s: &Student,
    p: &ProgrammingSkills,
    soft: &SoftSkills,
    pl: &Placement,
) -> Result<()> {
    let tx = db.conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO students (student_id, name, age, gender, email, phone,
                               enrollment_year, course_batch, city, graduation_year)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            s.student_id,
            s.name,
            s.age,
            s.gender,
            s.email,
            s.phone,
            s.enrollment_year,
            s.course_batch,
            s.city,
            s.graduation_year,
        ],
    )?;

    tx.execute(
        "INSERT INTO programming (student_id, language, problems_solved, assessments_completed,
                                  mini_projects, certifications_earned, latest_project_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            p.student_id,
            p.language,
            p.problems_solved,
            p.assessments_completed,
            p.mini_projects,
            p.certifications_earned,
            p.latest_project_score,
        ],
    )?;

    tx.execute(
        "INSERT INTO softskills (student_id, communication, teamwork, presentation,
                                 leadership, critical_thinking, interpersonal_skills)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            soft.student_id,
            soft.communication,
            soft.teamwork,
            soft.presentation,
            soft.leadership,
            soft.critical_thinking,
            soft.interpersonal_skills,
        ],
    )?;

    tx.execute(
        "INSERT INTO placements (student_id, mock_interview_score, internships_completed,
                                 placement_status, company_name, placement_package,
                                 interview_rounds_cleared, placement_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            pl.student_id,
            pl.mock_interview_score,
            pl.internships_completed,
            pl.placement_status,
            pl.company_name,
            pl.placement_package,
            pl.interview_rounds_cleared,
            pl.placement_date,
        ],
    )?;

    tx.commit()?;
    Ok(())
}
