use crate::models::{Artist, TrackRow};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, ListArray, ListBuilder,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use common::{Error, Result};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// A record type with a fixed Arrow layout.
pub trait ParquetRecord: Sized {
    fn schema() -> SchemaRef;
    fn to_batch(records: &[Self]) -> Result<RecordBatch>;
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

pub fn encode_parquet<R: ParquetRecord>(records: &[R]) -> Result<Vec<u8>> {
    let batch = R::to_batch(records)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer: Vec<u8> = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(buffer)
}

pub fn decode_parquet<R: ParquetRecord>(data: Vec<u8>) -> Result<Vec<R>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        records.extend(R::from_batch(&batch?)?);
    }
    Ok(records)
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| Error::SchemaMismatch(format!("Missing column '{}'", name)))?;

    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        Error::SchemaMismatch(format!(
            "Column '{}' has unexpected type {}",
            name,
            array.data_type()
        ))
    })
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn optional_i32(array: &Int32Array, index: usize) -> Option<i32> {
    if array.is_null(index) {
        None
    } else {
        Some(array.value(index))
    }
}

impl ParquetRecord for TrackRow {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("popularity", DataType::Int32, false),
            Field::new("duration", DataType::Int64, false),
            Field::new("explicit", DataType::Boolean, false),
            Field::new("energy", DataType::Float64, false),
            Field::new("key", DataType::Int32, false),
            Field::new("loudness", DataType::Float64, false),
            Field::new("mode", DataType::Int32, false),
            Field::new("speechiness", DataType::Float64, false),
            Field::new("acousticness", DataType::Float64, false),
            Field::new("instrumentalness", DataType::Float64, false),
            Field::new("liveness", DataType::Float64, false),
            Field::new("valence", DataType::Float64, false),
            Field::new("tempo", DataType::Float64, false),
            Field::new("time_signature", DataType::Int32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, true),
            Field::new("day", DataType::Int32, true),
            Field::new("danceability", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let ints = |f: fn(&TrackRow) -> i32| -> ArrayRef {
            Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
        };
        let floats = |f: fn(&TrackRow) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(rows.iter().map(f)))
        };
        let optional_ints = |f: fn(&TrackRow) -> Option<i32>| -> ArrayRef {
            Arc::new(rows.iter().map(f).collect::<Int32Array>())
        };

        let columns: Vec<ArrayRef> = vec![
            strings(rows.iter().map(|r| r.id.as_str())),
            strings(rows.iter().map(|r| r.name.as_str())),
            ints(|r| r.popularity),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.duration))),
            Arc::new(rows.iter().map(|r| Some(r.explicit)).collect::<BooleanArray>()),
            floats(|r| r.energy),
            ints(|r| r.key),
            floats(|r| r.loudness),
            ints(|r| r.mode),
            floats(|r| r.speechiness),
            floats(|r| r.acousticness),
            floats(|r| r.instrumentalness),
            floats(|r| r.liveness),
            floats(|r| r.valence),
            floats(|r| r.tempo),
            ints(|r| r.time_signature),
            ints(|r| r.year),
            optional_ints(|r| r.month),
            optional_ints(|r| r.day),
            strings(rows.iter().map(|r| r.danceability.as_str())),
            strings(rows.iter().map(|r| r.artist_id.as_str())),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id = column::<StringArray>(batch, "id")?;
        let name = column::<StringArray>(batch, "name")?;
        let popularity = column::<Int32Array>(batch, "popularity")?;
        let duration = column::<Int64Array>(batch, "duration")?;
        let explicit = column::<BooleanArray>(batch, "explicit")?;
        let energy = column::<Float64Array>(batch, "energy")?;
        let key = column::<Int32Array>(batch, "key")?;
        let loudness = column::<Float64Array>(batch, "loudness")?;
        let mode = column::<Int32Array>(batch, "mode")?;
        let speechiness = column::<Float64Array>(batch, "speechiness")?;
        let acousticness = column::<Float64Array>(batch, "acousticness")?;
        let instrumentalness = column::<Float64Array>(batch, "instrumentalness")?;
        let liveness = column::<Float64Array>(batch, "liveness")?;
        let valence = column::<Float64Array>(batch, "valence")?;
        let tempo = column::<Float64Array>(batch, "tempo")?;
        let time_signature = column::<Int32Array>(batch, "time_signature")?;
        let year = column::<Int32Array>(batch, "year")?;
        let month = column::<Int32Array>(batch, "month")?;
        let day = column::<Int32Array>(batch, "day")?;
        let danceability = column::<StringArray>(batch, "danceability")?;
        let artist_id = column::<StringArray>(batch, "artist_id")?;

        (0..batch.num_rows())
            .map(|i| -> Result<TrackRow> {
                Ok(TrackRow {
                    id: id.value(i).to_string(),
                    name: name.value(i).to_string(),
                    popularity: popularity.value(i),
                    duration: duration.value(i),
                    explicit: explicit.value(i),
                    energy: energy.value(i),
                    key: key.value(i),
                    loudness: loudness.value(i),
                    mode: mode.value(i),
                    speechiness: speechiness.value(i),
                    acousticness: acousticness.value(i),
                    instrumentalness: instrumentalness.value(i),
                    liveness: liveness.value(i),
                    valence: valence.value(i),
                    tempo: tempo.value(i),
                    time_signature: time_signature.value(i),
                    year: year.value(i),
                    month: optional_i32(month, i),
                    day: optional_i32(day, i),
                    danceability: danceability.value(i).parse()?,
                    artist_id: artist_id.value(i).to_string(),
                })
            })
            .collect()
    }
}

impl ParquetRecord for Artist {
    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("followers", DataType::Int64, false),
            Field::new(
                "genres",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                false,
            ),
            Field::new("name", DataType::Utf8, false),
            Field::new("popularity", DataType::Int32, false),
        ]))
    }

    fn to_batch(artists: &[Self]) -> Result<RecordBatch> {
        let mut genres = ListBuilder::new(StringBuilder::new());
        for artist in artists {
            for genre in &artist.genres {
                genres.values().append_value(genre);
            }
            genres.append(true);
        }

        let columns: Vec<ArrayRef> = vec![
            strings(artists.iter().map(|a| a.id.as_str())),
            Arc::new(Int64Array::from_iter_values(artists.iter().map(|a| a.followers))),
            Arc::new(genres.finish()),
            strings(artists.iter().map(|a| a.name.as_str())),
            Arc::new(Int32Array::from_iter_values(artists.iter().map(|a| a.popularity))),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let id = column::<StringArray>(batch, "id")?;
        let followers = column::<Int64Array>(batch, "followers")?;
        let genres = column::<ListArray>(batch, "genres")?;
        let name = column::<StringArray>(batch, "name")?;
        let popularity = column::<Int32Array>(batch, "popularity")?;

        (0..batch.num_rows())
            .map(|i| -> Result<Artist> {
                let values = genres.value(i);
                let values = values
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| {
                        Error::SchemaMismatch("Column 'genres' must hold strings".to_string())
                    })?;

                Ok(Artist {
                    id: id.value(i).to_string(),
                    followers: followers.value(i),
                    genres: values.iter().flatten().map(str::to_string).collect(),
                    name: name.value(i).to_string(),
                    popularity: popularity.value(i),
                })
            })
            .collect()
    }
}
