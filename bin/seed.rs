// Clinic API - Demo Data Seeder
// Deterministic dataset covering every enum value, age bucket, appointment
// bucket, and payment status, so the analytics endpoints have something to
// show out of the box.

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::path::Path;

use clinic_api::db::{
    self, insert_appointment, insert_appointment_service, insert_patient, insert_payment,
    insert_provider, insert_service,
};
use clinic_api::models::{
    Appointment, AppointmentService, AppointmentStatus, Gender, Patient, Payment, PaymentMethod,
    PaymentStatus, Provider, Service, Source,
};

const FIRST_NAMES: [&str; 10] = [
    "Ana", "Bruno", "Carla", "Diego", "Elena", "Felix", "Gina", "Hugo", "Iris", "Jonas",
];
const LAST_NAMES: [&str; 6] = ["Reyes", "Kim", "Okafor", "Marin", "Silva", "Novak"];

const SERVICES: [(&str, &str, i64, i64); 8] = [
    ("svc_consult", "Consultation", 15000, 30),
    ("svc_botox", "Botox", 45000, 45),
    ("svc_filler", "Dermal Filler", 60000, 60),
    ("svc_facial", "Signature Facial", 22000, 60),
    ("svc_laser", "Laser Treatment", 80000, 45),
    ("svc_peel", "Chemical Peel", 30000, 45),
    ("svc_micro", "Microneedling", 35000, 60),
    ("svc_massage", "Lymphatic Massage", 18000, 50),
];

const PROVIDERS: [(&str, &str, &str); 5] = [
    ("prov_1", "Sofia", "Alvarez"),
    ("prov_2", "Marcus", "Chen"),
    ("prov_3", "Priya", "Nair"),
    ("prov_4", "Tomas", "Weber"),
    ("prov_5", "Leila", "Haddad"),
];

fn day(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid seed date")
}

fn main() -> Result<()> {
    let db_path = std::env::var("CLINIC_DB").unwrap_or_else(|_| "clinic.db".to_string());
    let conn = db::open(Path::new(&db_path))?;

    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM patient", [], |row| row.get(0))?;
    if existing > 0 {
        println!("Database at {db_path} already has {existing} patients, nothing to do.");
        return Ok(());
    }

    println!("Seeding demo data into {db_path}");
    let opened = day(2025, 1, 2, 8);

    for (id, name, price, duration) in SERVICES {
        insert_service(
            &conn,
            &Service {
                id: id.to_string(),
                name: name.to_string(),
                description: format!("{name} ({duration} min)"),
                price,
                duration,
                created_date: opened,
            },
        )?;
    }

    for (id, first, last) in PROVIDERS {
        insert_provider(
            &conn,
            &Provider {
                id: id.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{first}.{last}@clinic.example").to_lowercase(),
                phone: format!("555-02{}", &id[id.len() - 1..]),
                created_date: opened,
            },
        )?;
    }

    let mut appointments = 0usize;
    let mut payments = 0usize;

    for i in 0..60usize {
        let first = FIRST_NAMES[i % FIRST_NAMES.len()];
        let last = LAST_NAMES[i % LAST_NAMES.len()];
        let patient_id = format!("pat_{i:03}");

        // Ages 16..=75 in steps of one, a few with no recorded birth date
        let date_of_birth = if i % 15 == 14 {
            None
        } else {
            let year = 2009 - (i as i32);
            Some(day(year, (i as u32 % 12) + 1, (i as u32 % 28) + 1, 0))
        };
        let created_date = day(2025, (i as u32 % 8) + 1, (i as u32 % 28) + 1, 9);

        insert_patient(
            &conn,
            &Patient {
                id: patient_id.clone(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                date_of_birth,
                gender: Gender::ALL[i % Gender::ALL.len()],
                source: Source::ALL[i % Source::ALL.len()],
                address: format!("{} Main St", 100 + i),
                phone: format!("555-1{i:03}"),
                email: format!("{first}.{last}.{i}@example.com").to_lowercase(),
                created_date,
            },
        )?;

        // 0..=7 appointments per patient, exercising every behavior bucket
        for k in 0..(i % 8) {
            let appointment_id = format!("appt_{i:03}_{k}");
            let status = AppointmentStatus::ALL[(i + k) % AppointmentStatus::ALL.len()];
            insert_appointment(
                &conn,
                &Appointment {
                    id: appointment_id.clone(),
                    patient_id: patient_id.clone(),
                    status,
                    created_date: created_date + Duration::days(k as i64),
                },
            )?;
            appointments += 1;

            let slot_day = day(2025, (k as u32 % 12) + 1, ((i + 3 * k) as u32 % 28) + 1, 10);
            let mut total = 0i64;
            let service_count = 1 + (i + k) % 3;
            for s in 0..service_count {
                let (service_id, _, price, duration) = SERVICES[(i + k + s) % SERVICES.len()];
                let provider_id = PROVIDERS[(i + s) % PROVIDERS.len()].0;
                insert_appointment_service(
                    &conn,
                    &AppointmentService {
                        appointment_id: appointment_id.clone(),
                        service_id: service_id.to_string(),
                        provider_id: provider_id.to_string(),
                        start: slot_day + Duration::hours(s as i64),
                        end: slot_day + Duration::hours(s as i64) + Duration::minutes(duration),
                    },
                )?;
                total += price;
            }

            // Cancelled appointments go unpaid; the rest get one payment
            if status != AppointmentStatus::Cancelled {
                let (primary_service, _, _, _) = SERVICES[(i + k) % SERVICES.len()];
                insert_payment(
                    &conn,
                    &Payment {
                        id: uuid::Uuid::new_v4().to_string(),
                        patient_id: patient_id.clone(),
                        appointment_id: appointment_id.clone(),
                        provider_id: PROVIDERS[i % PROVIDERS.len()].0.to_string(),
                        service_id: primary_service.to_string(),
                        amount: total,
                        date: slot_day + Duration::hours(4),
                        method: PaymentMethod::ALL[(i + k) % PaymentMethod::ALL.len()],
                        status: PaymentStatus::ALL[(i + k) % PaymentStatus::ALL.len()],
                        created_date: slot_day + Duration::hours(4),
                    },
                )?;
                payments += 1;
            }
        }
    }

    println!("✓ {} services", SERVICES.len());
    println!("✓ {} providers", PROVIDERS.len());
    println!("✓ 60 patients");
    println!("✓ {appointments} appointments");
    println!("✓ {payments} payments");
    Ok(())
}
