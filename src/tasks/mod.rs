pub mod national_report;
